//! jcontainer CLI.
//!
//! ```sh
//! jcontainer run [--image REF] [--net] [--memory SIZE] [--cpu PERCENT] [ROOTFS] CMD [ARGS...]
//! jcontainer list
//! jcontainer stop  CONTAINER_ID
//! jcontainer logs  CONTAINER_ID
//! jcontainer rm    CONTAINER_ID
//! ```
//!
//! The `child` mode is internal: the parent re-executes this binary with
//! it inside the new namespaces.

use std::process::ExitCode;

use jcontainer::{Lifecycle, Platform, RunConfig};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // Diagnostics go to stderr; stdout belongs to container output and
    // the list/logs commands.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        usage();
        return ExitCode::FAILURE;
    }

    let platform = Platform::detect();

    match args[1].as_str() {
        "run" => match RunConfig::parse(&args[2..]) {
            Ok(config) => match jcontainer::run_container(platform, config) {
                // Pass the child's exit code through unchanged.
                Ok(code) => std::process::exit(code),
                Err(e) => fail(e),
            },
            Err(e) => {
                eprintln!("ERROR: {e}");
                usage();
                ExitCode::FAILURE
            }
        },
        "child" => {
            if args.len() < 4 {
                eprintln!("ERROR: child requires <rootfs> <command> [args...]");
                return ExitCode::FAILURE;
            }
            match jcontainer::run_child(platform, &args[2], &args[3..]) {
                Ok(code) => std::process::exit(code),
                Err(e) => fail(e),
            }
        }
        "list" => run_lifecycle(|l| l.list()),
        "stop" => with_id(&args, |l, id| l.stop(id)),
        "logs" => with_id(&args, |l, id| l.logs(id)),
        "rm" => with_id(&args, |l, id| l.rm(id)),
        unknown => {
            eprintln!("ERROR: unknown command: {unknown}");
            usage();
            ExitCode::FAILURE
        }
    }
}

fn run_lifecycle(f: impl FnOnce(&Lifecycle) -> jcontainer::Result<()>) -> ExitCode {
    match f(&Lifecycle::new()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(e),
    }
}

fn with_id(
    args: &[String],
    f: impl FnOnce(&Lifecycle, &str) -> jcontainer::Result<()>,
) -> ExitCode {
    let Some(id) = args.get(2) else {
        eprintln!("ERROR: {} requires a container id", args[1]);
        return ExitCode::FAILURE;
    };
    run_lifecycle(|l| f(l, id))
}

fn fail(e: jcontainer::Error) -> ExitCode {
    eprintln!("ERROR: {e}");
    ExitCode::FAILURE
}

fn usage() {
    eprintln!(
        r#"jcontainer - a minimal container runtime

USAGE:
    jcontainer run [--image REF] [--net] [--memory SIZE] [--cpu PERCENT] [ROOTFS] CMD [ARGS...]
    jcontainer list
    jcontainer stop <container-id>
    jcontainer logs <container-id>
    jcontainer rm   <container-id>

OPTIONS:
    --image REF       Pull and run an image (makes ROOTFS optional)
    --net             Give the container its own network namespace + veth
    --memory SIZE     Memory limit, e.g. 512m, 1g (Linux only)
    --cpu PERCENT     CPU limit as percent of one core, 100 = 1 core (Linux only)

EXAMPLES:
    jcontainer run --image alpine:3.19 /bin/sh
    jcontainer run --memory 100m --cpu 50 ./rootfs /bin/sh -c 'echo hi'
    jcontainer stop 1a2b3c4d
"#
    );
}
