//! Prints the ClusterLink CRD manifests as a multi-document YAML stream.

use anyhow::{Context, Result};
use crds::{Cluster, ClusterNode, NodeConfig};
use kube::CustomResourceExt;

fn main() -> Result<()> {
    for crd in [Cluster::crd(), ClusterNode::crd(), NodeConfig::crd()] {
        let name = crd.metadata.name.clone().unwrap_or_default();
        let yaml = serde_yaml::to_string(&crd).with_context(|| format!("failed to render CRD {}", name))?;
        println!("---");
        print!("{}", yaml);
    }
    Ok(())
}
