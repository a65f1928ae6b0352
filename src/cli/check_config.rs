//! Check-config command - validate and normalize a policy file

use crate::cli::style::{Stylize, check};
use anstream::println;
use mergeq::config::load_policy;
use mergeq::error::{Error, Result};
use std::path::Path;

/// Run the check-config command
pub fn run_check_config(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(Error::Config(format!("{} does not exist", path.display())));
    }

    let policy = load_policy(path)?;

    println!("{} {} is valid", check(), path.display().to_string().emphasis());
    println!();
    println!("{}", "# normalized policy".muted());
    println!("{}", policy.to_toml()?);

    Ok(())
}
