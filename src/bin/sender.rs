use std::path::PathBuf;
use std::process::ExitCode;

use rft::{Config, Error, Sender};

struct Args {
    host: String,
    port: u16,
    filename: PathBuf,
    bytes_to_transfer: u64,
}

fn parse_args() -> Result<Args, Error> {
    let mut argv = std::env::args().skip(1);
    let usage = "usage: sender <receiver_hostname> <receiver_port> <filename_to_transfer> <bytes_to_transfer>";

    let host = argv.next().ok_or_else(|| Error::InvalidArgument(usage.into()))?;
    let port: u16 = argv
        .next()
        .ok_or_else(|| Error::InvalidArgument(usage.into()))?
        .parse()
        .map_err(|_| Error::InvalidArgument("receiver_port must be a u16".into()))?;
    let filename: PathBuf = argv.next().ok_or_else(|| Error::InvalidArgument(usage.into()))?.into();
    let bytes_to_transfer: u64 = argv
        .next()
        .ok_or_else(|| Error::InvalidArgument(usage.into()))?
        .parse()
        .map_err(|_| Error::InvalidArgument("bytes_to_transfer must be a non-negative integer".into()))?;

    if argv.next().is_some() {
        return Err(Error::InvalidArgument(usage.into()));
    }

    Ok(Args { host, port, filename, bytes_to_transfer })
}

fn run() -> Result<(), Error> {
    env_logger::init();
    let args = parse_args()?;

    let sender = Sender::connect(&args.host, args.port, Config::default())?;
    sender.send_file(&args.filename, args.bytes_to_transfer)?;
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("sender: {e}");
            ExitCode::FAILURE
        }
    }
}
