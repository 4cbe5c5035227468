//! Rule kinds for secbench and a demonstration benchmark catalog.
//!
//! Every rule kind is a read-only query: `reg query`, the shared `secedit`
//! export, or an arbitrary command, all through the [`secbench_core::RuleContext`]
//! seams so tests can substitute fakes.

pub mod builtin;
pub mod command;
pub mod expect;
pub mod policy;
pub mod registry;

pub use builtin::{demo_catalog, DEMO_CATALOG_NAME, DEMO_CATALOG_VERSION, DEMO_TOTAL_POINTS};
pub use command::{CommandExpectation, CommandRule};
pub use expect::NumericExpectation;
pub use policy::{PolicyExpectation, SecurityPolicyRule};
pub use registry::{parse_reg_query_output, RegValue, RegistryExpectation, RegistryValueRule};
