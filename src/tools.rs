//! Wrappers around the Workbench and FSL command-line tools

pub mod convert;
pub mod meants;
pub mod threshold;

use crate::runner::find_on_path;
use crate::structs::Toolchain;

impl Toolchain {
    /// Programs that cannot be resolved on `PATH`
    #[must_use]
    pub fn missing_programs(&self) -> Vec<&str> {
        [&self.converter, &self.cluster, &self.meants]
            .into_iter()
            .map(String::as_str)
            .filter(|program| find_on_path(program).is_none())
            .collect()
    }
}
