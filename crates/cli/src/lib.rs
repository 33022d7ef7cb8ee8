// CaseGrid CLI library: the export service and exit code registry, shared
// by the `casegrid` binary and its tests.

pub mod exit_codes;
pub mod export;
