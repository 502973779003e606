// Copyright (c) 2025 The netcell authors
//
// SPDX-License-Identifier: Apache-2.0
//

use anyhow::{anyhow, Context, Result};
use tokio::process::Command;

/// Runs an external tool and returns its stdout; a non-zero exit status is
/// an error carrying the tool's stderr.
pub(crate) async fn output(bin: &str, args: &[&str]) -> Result<String> {
    debug!(sl!(), "exec"; "bin" => bin, "args" => format!("{:?}", args));
    let out = Command::new(bin)
        .args(args)
        .output()
        .await
        .with_context(|| format!("spawn {}", bin))?;

    if !out.status.success() {
        return Err(anyhow!(
            "{} {} failed: {}",
            bin,
            args.join(" "),
            String::from_utf8_lossy(&out.stderr).trim()
        ));
    }

    Ok(String::from_utf8_lossy(&out.stdout).into_owned())
}

/// Like [`output`] but discards stdout.
pub(crate) async fn run(bin: &str, args: &[&str]) -> Result<()> {
    output(bin, args).await.map(|_| ())
}

/// Runs an external tool, treating a failure whose stderr contains one of
/// `tolerated` as success. Used on teardown paths where "already gone" must
/// not be fatal.
pub(crate) async fn run_tolerant(bin: &str, args: &[&str], tolerated: &[&str]) -> Result<()> {
    match run(bin, args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            let msg = format!("{:#}", e);
            if tolerated.iter().any(|t| msg.contains(t)) {
                debug!(sl!(), "tolerated failure"; "bin" => bin, "error" => msg);
                Ok(())
            } else {
                Err(e)
            }
        }
    }
}
