//! # brokkr-deliver
//!
//! The delivery pipeline: decode the delivery package, materialize its
//! template archive into an ephemeral staging tree, derive localization
//! substitutions from the component's resource access specs, cascade them
//! with user configuration under the package's schema, splice the final
//! substitution list into the staged files, publish the tree to object
//! storage, and request the downstream deployment resource.

pub mod cascade;
pub mod localize;
pub mod output;
pub mod package;
pub mod publish;
pub mod run;
pub mod stage;
pub mod substitute;

pub use cascade::configure;
pub use localize::localize;
pub use output::{CreateOutcome, DeploymentApi, DeploymentResource, LocalManifestApi};
pub use package::{parse_package, ConfigRule, DeliveryPackage, LocalizationRule, Substitution};
pub use publish::{publish_tree, DirObjectStore, ObjectStore, S3ObjectStore};
pub use run::{RunReport, RunRequest, Runner, VerifySpec};
pub use stage::StagingTree;
pub use substitute::apply;
