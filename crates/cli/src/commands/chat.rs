use crate::commands::{current_thread_runtime, load_config, CommandResult};
use remedi_agent::runtime::ChatRuntime;
use remedi_core::domain::user::UserId;
use remedi_db::{connect_with_settings, migrations};

/// One pipeline turn from the terminal, against the configured database and
/// providers. Useful for smoke-testing a deployment without the HTTP surface.
pub fn run(user: &str, message: &str) -> CommandResult {
    let config = match load_config("chat") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match current_thread_runtime("chat") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let chat_runtime = ChatRuntime::from_config(&config, pool.clone());
        let response = chat_runtime
            .chat(&UserId(user.to_string()), message, None)
            .await
            .map_err(|error| ("pipeline", error.to_string(), 6u8))?;

        pool.close().await;
        serde_json::to_string_pretty(&response)
            .map_err(|error| ("serialization", error.to_string(), 7u8))
    });

    match result {
        // The chat response is the payload itself rather than a status envelope.
        Ok(rendered) => CommandResult { exit_code: 0, output: rendered },
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("chat", error_class, message, exit_code)
        }
    }
}
