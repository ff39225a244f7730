use std::sync::Arc;

use poise::serenity_prelude::{self as serenity, GatewayIntents, GuildId};
use sqlx::PgPool;
use tracing::{error, info, warn};

use crate::bot::data::Data;
use crate::bot::error::Error;
use crate::commands;
use crate::config::Settings;
use crate::constants::messages;
use crate::handlers::event_handler::event_handler;

/// Reply for a failed command check. Prefix invocations stay silent.
fn check_refusal<U, E>(ctx: poise::Context<'_, U, E>) -> Option<&'static str> {
    refusal_for(matches!(ctx, poise::Context::Application(_)))
}

fn refusal_for(is_application: bool) -> Option<&'static str> {
    is_application.then_some(messages::NOT_AN_OPERATOR)
}

pub async fn run(settings: Settings, pool: PgPool) -> Result<(), Error> {
    let data = Arc::new(Data::new(pool, settings.clone()));

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                commands::gmute::gmute(),
                commands::gmute::ungmute(),
                commands::gmute::gmutelist(),
                commands::gmute::gmuteinfo(),
                commands::gmutestat::gmutestat(),
            ],
            // Prefix commands let operators target a user by replying to them
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(settings.command_prefix.clone()),
                ..Default::default()
            },
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            on_error: |error| {
                Box::pin(async move {
                    match error {
                        poise::FrameworkError::Command { error, ctx, .. } => {
                            error!("Command error: {:?}", error);
                            let _ = ctx.say(format!("Error: {}", error)).await;
                        }
                        poise::FrameworkError::ArgumentParse { error, ctx, .. } => {
                            let _ = ctx.say(format!("Invalid argument: {}", error)).await;
                        }
                        poise::FrameworkError::CommandCheckFailed { ctx, .. } => {
                            warn!(
                                "{} was refused /{}",
                                ctx.author().id,
                                ctx.command().name
                            );
                            // A slash command shows "interaction failed" unless answered
                            if let Some(text) = check_refusal(ctx) {
                                let reply = poise::CreateReply::default()
                                    .content(text)
                                    .ephemeral(true);
                                let _ = ctx.send(reply).await;
                            }
                        }
                        poise::FrameworkError::UnknownCommand { .. } => {
                            // Ordinary chat that happens to start with the prefix
                        }
                        err => {
                            error!("Framework error: {:?}", err);
                        }
                    }
                })
            },
            ..Default::default()
        })
        .setup(|ctx, ready, framework| {
            Box::pin(async move {
                info!("Bot connected as {}", ready.user.name);

                // Register commands globally or per-guild based on GUILD_ID env var
                match data.settings.guild_id {
                    Some(guild_id) => {
                        let guild_id = GuildId::new(guild_id);
                        info!(
                            "Registering {} commands in guild {}",
                            framework.options().commands.len(),
                            guild_id
                        );
                        if let Err(e) = poise::builtins::register_in_guild(
                            ctx,
                            &framework.options().commands,
                            guild_id,
                        )
                        .await
                        {
                            error!("[FAIL] Failed to register guild commands: {:?}", e);
                            error!("Re-invite URL: https://discord.com/api/oauth2/authorize?client_id={}&permissions=0&scope=bot%20applications.commands", ready.user.id);
                            return Err(Error::Serenity(e));
                        }

                        match ctx.http.get_guild_commands(guild_id).await {
                            Ok(registered) => {
                                info!("[OK] Discord API confirms {} guild commands", registered.len());
                                for cmd in &registered {
                                    info!("  → Guild command: /{} (id: {})", cmd.name, cmd.id);
                                }
                            }
                            Err(e) => {
                                warn!("Could not verify guild commands: {:?}", e);
                            }
                        }
                    }
                    None => {
                        info!(
                            "Attempting to register {} commands globally",
                            framework.options().commands.len()
                        );
                        if let Err(e) =
                            poise::builtins::register_globally(ctx, &framework.options().commands)
                                .await
                        {
                            error!("Failed to register commands globally: {:?}", e);
                            return Err(Error::Serenity(e));
                        }
                        info!("Note: Global commands can take up to 1 hour to appear in all servers");
                    }
                }

                Ok(data)
            })
        })
        .build();

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = serenity::ClientBuilder::new(&settings.discord_token, intents)
        .framework(framework)
        .await
        .map_err(Error::Serenity)?;

    info!("Starting Discord client...");
    client.start().await.map_err(Error::Serenity)
}
