//! Prints the DeadmansSnitchIntegration CRD as YAML.
//!
//! Hive's ClusterDeployment and SyncSet are installed by Hive itself and
//! are not generated here.

use crds::DeadmansSnitchIntegration;
use kube::CustomResourceExt;

fn main() -> Result<(), serde_yaml::Error> {
    let crd = DeadmansSnitchIntegration::crd();
    print!("{}", serde_yaml::to_string(&crd)?);
    Ok(())
}
