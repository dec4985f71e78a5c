use bytes::Bytes;
use loa_bridge::Device;

use crate::cmd::{ConnectionArgs, LsArgs, RemoteArgs, WriteArgs};
use crate::exit::{bridge_error, io_error, CliError, CliResult, DEVICE_FAILURE, SUCCESS, USAGE};
use crate::output::{print_listing, print_raw, print_status, OutputFormat};

pub async fn read(args: RemoteArgs, conn: &ConnectionArgs, format: OutputFormat) -> CliResult<i32> {
    let device = conn.open(format).await?;
    let data = device
        .read_file(&args.remote)
        .await
        .map_err(|err| bridge_error(&format!("read {} failed", args.remote), err));
    finish(&device).await;
    let data = data?;

    match format {
        OutputFormat::Json => print_read_json(&args.remote, &data),
        _ => print_raw(&data),
    }
    Ok(SUCCESS)
}

pub async fn write(args: WriteArgs, conn: &ConnectionArgs, format: OutputFormat) -> CliResult<i32> {
    let remote = match args.remote {
        Some(remote) => remote,
        None => args
            .local
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| CliError::new(USAGE, "local path has no file name"))?,
    };
    let data = std::fs::read(&args.local)
        .map_err(|err| io_error(&format!("failed reading {}", args.local.display()), err))?;
    let len = data.len();

    let device = conn.open(format).await?;
    let written = device
        .write_file(&remote, Bytes::from(data))
        .await
        .map_err(|err| bridge_error(&format!("write {remote} failed"), err));
    finish(&device).await;

    if !written? {
        return Err(CliError::new(
            DEVICE_FAILURE,
            format!("write {remote} failed: device did not confirm the write"),
        ));
    }
    print_status("write", &remote, Some(len), format);
    Ok(SUCCESS)
}

pub async fn remove_file(
    args: RemoteArgs,
    conn: &ConnectionArgs,
    format: OutputFormat,
) -> CliResult<i32> {
    let device = conn.open(format).await?;
    let result = device.delete_file(&args.remote).await;
    finish(&device).await;
    result.map_err(|err| bridge_error(&format!("rm {} failed", args.remote), err))?;
    print_status("delete file", &args.remote, None, format);
    Ok(SUCCESS)
}

pub async fn create_dir(
    args: RemoteArgs,
    conn: &ConnectionArgs,
    format: OutputFormat,
) -> CliResult<i32> {
    let device = conn.open(format).await?;
    let result = device.create_dir(&args.remote).await;
    finish(&device).await;
    result.map_err(|err| bridge_error(&format!("mkdir {} failed", args.remote), err))?;
    print_status("create directory", &args.remote, None, format);
    Ok(SUCCESS)
}

pub async fn remove_dir(
    args: RemoteArgs,
    conn: &ConnectionArgs,
    format: OutputFormat,
) -> CliResult<i32> {
    let device = conn.open(format).await?;
    let result = device.delete_dir(&args.remote).await;
    finish(&device).await;
    result.map_err(|err| bridge_error(&format!("rmdir {} failed", args.remote), err))?;
    print_status("delete directory", &args.remote, None, format);
    Ok(SUCCESS)
}

pub async fn list(args: LsArgs, conn: &ConnectionArgs, format: OutputFormat) -> CliResult<i32> {
    let device = conn.open(format).await?;
    let result = device.list_dir(&args.remote).await;
    finish(&device).await;
    let entries = result.map_err(|err| bridge_error(&format!("ls {} failed", args.remote), err))?;
    print_listing(&args.remote, &entries, format);
    Ok(SUCCESS)
}

/// Close the connection; a failure here does not change the outcome.
pub(crate) async fn finish(device: &Device) {
    if let Err(err) = device.bridge().close().await {
        tracing::debug!(error = %err, "close failed");
    }
}

fn print_read_json(path: &str, data: &[u8]) {
    #[derive(serde::Serialize)]
    struct ReadOutput<'a> {
        path: &'a str,
        size: usize,
        content: std::borrow::Cow<'a, str>,
    }

    crate::output::print_serialized(&ReadOutput {
        path,
        size: data.len(),
        content: String::from_utf8_lossy(data),
    });
}
