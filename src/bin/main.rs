use std::{
    io::{self, IsTerminal},
    process::ExitCode,
};

use clap::error::ErrorKind;
use tracing::{error, info};

use keepup::{
    cli::parse_args,
    config::{self, Invocation},
    error::{EXIT_FAILURE, SupervisorError},
    logs::init_logging,
    pidfile::PidFile,
    status::show_status,
    supervisor::Supervisor,
};

fn main() -> ExitCode {
    let args = match parse_args() {
        Ok(args) => args,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            let _ = err.print();
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    let invocation = match config::resolve(&args) {
        Ok(invocation) => invocation,
        Err(err) => {
            eprintln!("Error: {err}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    match invocation {
        Invocation::Status { pidfile } => {
            init_logging(args.log_level, io::stderr().is_terminal());
            match show_status(&PidFile::new(pidfile)) {
                Ok(_) => ExitCode::SUCCESS,
                Err(err) => {
                    eprintln!("Error: {err}");
                    ExitCode::from(EXIT_FAILURE)
                }
            }
        }
        Invocation::Supervise(config) => {
            let ansi = !config.daemonize && io::stdout().is_terminal();
            init_logging(args.log_level, ansi);

            match Supervisor::new(config).launch() {
                Ok(signal) => {
                    info!("bye ({signal})");
                    ExitCode::SUCCESS
                }
                // bail-out was already logged ahead of the on-error hook
                Err(err @ SupervisorError::RestartBudgetExhausted { .. }) => {
                    ExitCode::from(err.exit_code())
                }
                Err(err) => {
                    error!("{err}");
                    ExitCode::from(err.exit_code())
                }
            }
        }
    }
}
