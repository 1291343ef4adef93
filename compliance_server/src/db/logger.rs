use flexi_logger::{Age, Cleanup, Criterion, Duplicate, FileSpec, Logger, LoggerHandle, Naming};

/// File logging under `logs/`, rotated daily. `RUST_LOG` overrides the level.
pub fn init_logger() -> anyhow::Result<LoggerHandle> {
    let handle = Logger::try_with_env_or_str("info")?
        .log_to_file(
            FileSpec::default()
                .directory("logs")
                .basename("compliance_server"),
        )
        .rotate(
            Criterion::Age(Age::Day),
            Naming::Numbers,
            Cleanup::KeepLogFiles(7),
        )
        .duplicate_to_stderr(Duplicate::Info)
        .start()?;

    Ok(handle)
}
