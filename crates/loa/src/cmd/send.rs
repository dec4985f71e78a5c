use loa_message::Value;

use crate::cmd::fs::finish;
use crate::cmd::{ConnectionArgs, SendArgs};
use crate::exit::{bridge_error, io_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_response, OutputFormat};

pub async fn run(args: SendArgs, conn: &ConnectionArgs, format: OutputFormat) -> CliResult<i32> {
    if !args.address.starts_with('/') {
        return Err(CliError::new(
            USAGE,
            format!("address must start with '/': {}", args.address),
        ));
    }
    let values: Vec<Value> = args.args.iter().map(|arg| parse_arg(arg)).collect();
    let raw = match &args.raw {
        Some(path) => Some(
            std::fs::read(path)
                .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?,
        ),
        None => None,
    };

    let device = conn.open(format).await?;
    let bridge = device.bridge();
    let result = match raw {
        Some(data) => bridge.send_raw_request(&args.address, values, data).await,
        None => bridge.send_request(&args.address, values).await,
    };
    finish(&device).await;

    let value = result.map_err(|err| bridge_error(&format!("{} failed", args.address), err))?;
    print_response(&args.address, &value, format);
    Ok(SUCCESS)
}

/// Interpret a command-line argument as the narrowest matching value.
fn parse_arg(arg: &str) -> Value {
    if let Ok(int) = arg.parse::<i32>() {
        return Value::Int(int);
    }
    if let Ok(long) = arg.parse::<i64>() {
        return Value::Long(long);
    }
    if let Ok(float) = arg.parse::<f64>() {
        if float.is_finite() {
            return Value::Double(float);
        }
    }
    match arg {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::Str(arg.to_string()),
    }
}
