use std::process::ExitCode;

use clap::Parser;

#[macro_use]
extern crate log;

mod export;
mod image_util;
mod logger;
mod prompt;

use export::ExportArgs;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[clap(flatten)]
    args: ExportArgs,
}

fn main() -> ExitCode {
    // parsed manually so argument errors still reach the exit pause
    // (the tool is commonly launched by dropping a gif onto it)
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            if !err.use_stderr() {
                return ExitCode::SUCCESS;
            }

            prompt::pause();
            return ExitCode::FAILURE;
        }
    };

    logger::init("info");
    info!("{} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let code = match export::export_frames(&cli.args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    };

    if !cli.args.no_pause {
        prompt::pause();
    }

    code
}
