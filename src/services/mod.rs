pub mod gmute;
