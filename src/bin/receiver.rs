use std::path::PathBuf;
use std::process::ExitCode;

use rft::{Config, Error, Receiver};

struct Args {
    port: u16,
    filename: PathBuf,
}

fn parse_args() -> Result<Args, Error> {
    let mut argv = std::env::args().skip(1);
    let usage = "usage: receiver <udp_port> <filename_to_write>";

    let port: u16 = argv
        .next()
        .ok_or_else(|| Error::InvalidArgument(usage.into()))?
        .parse()
        .map_err(|_| Error::InvalidArgument("udp_port must be a u16".into()))?;
    let filename: PathBuf = argv.next().ok_or_else(|| Error::InvalidArgument(usage.into()))?.into();

    if argv.next().is_some() {
        return Err(Error::InvalidArgument(usage.into()));
    }

    Ok(Args { port, filename })
}

fn run() -> Result<(), Error> {
    env_logger::init();
    let args = parse_args()?;

    let receiver = Receiver::listen(args.port, Config::default())?;
    receiver.receive_file(&args.filename)?;
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("receiver: {e}");
            ExitCode::FAILURE
        }
    }
}
