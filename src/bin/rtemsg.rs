//! CLI entry point: parses arguments, runs the format compiler (and, in
//! `-c` mode, only that), or a full binary decode, mapping the result onto
//! the documented exit codes (spec.md §6).

use std::env;
use std::process::ExitCode;

use rtemsg::cli;
use rtemsg::compiler::header;
use rtemsg::error::RunError;
use rtemsg::session::{self, Decoder};

fn run() -> Result<(), RunError> {
    let argv: Vec<String> = env::args().collect();
    let params = cli::parse_params(&argv)?;

    let filter = if params.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let fmt_files = cli::resolve_fmt_files(&params.fmt_folder);
    log::info!("compiling {} format file(s) from {}", fmt_files.len(), params.fmt_folder.display());

    let check_only = params.check_only;
    let binary_file = params.binary_file.clone();
    let mut decoder = Decoder::compile(&fmt_files, params);

    if !decoder.plans.errors.is_empty() {
        for e in &decoder.plans.errors {
            log::error!("{e}");
        }
        return Err(RunError::ParseErrors);
    }

    if check_only {
        let mut rewritten = 0usize;
        for file_header in &decoder.plans.headers {
            match header::write_header(file_header, decoder.params.keep_backup, decoder.params.purge_defines) {
                Ok(true) => rewritten += 1,
                Ok(false) => {}
                Err(e) => return Err(RunError::Fatal(rtemsg::error::FatalError::Io(17, e))),
            }
        }
        log::info!(
            "syntax check complete: {} message plan(s), {} header(s) regenerated",
            decoder.plans.plans.len(),
            rewritten
        );
        return Ok(());
    }

    let binary_file = binary_file.expect("cli::parse_params guarantees this outside -c mode");
    let report = session::decode_file(&binary_file, &mut decoder)?;
    decoder.write_outputs()?;

    log::info!(
        "decoded {} message(s), {} non-fatal decode error(s)",
        report.messages_decoded,
        report.decode_errors
    );
    if report.fatal_decode_errors > 0 {
        return Err(RunError::FatalDecode);
    }
    if report.decode_errors > 0 {
        return Err(RunError::NonFatalDecode);
    }
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("rtemsg: {e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
