use tracing::info;

use crate::cmd::fs::finish;
use crate::cmd::{parse_duration, ConnectionArgs, MonitorArgs};
use crate::exit::{CliError, CliResult, SUCCESS, TRANSPORT_ERROR};
use crate::output::OutputFormat;

/// Stay connected so forwarded device logs reach the console.
pub async fn run(args: MonitorArgs, conn: &ConnectionArgs, format: OutputFormat) -> CliResult<i32> {
    let limit = args.duration.as_deref().map(parse_duration).transpose()?;
    let device = conn.open(format).await?;
    info!("monitoring device output");

    let stop = async {
        match limit {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            finish(&device).await;
            Ok(SUCCESS)
        }
        _ = stop => {
            finish(&device).await;
            Ok(SUCCESS)
        }
        _ = device.bridge().disconnected() => {
            Err(CliError::new(TRANSPORT_ERROR, "device disconnected"))
        }
    }
}
