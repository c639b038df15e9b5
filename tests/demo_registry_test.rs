//! The registry shipped in `registries/` must always load.

use std::path::PathBuf;

use neurohost::cli::commands::validate::validate;
use neurohost::domain::models::{ConfigSnapshot, ReloadReason, ReloadTrigger};
use neurohost::services::RegistryLoader;

fn demo_manifest() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("registries/manifest.hocon")
}

#[tokio::test]
async fn test_demo_registry_validates() {
    let report = validate(demo_manifest()).await.unwrap();
    let names: Vec<&str> = report.agents.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["hello_world", "music_nerd_pro"]);
    assert_eq!(report.agents[0].front_man.as_deref(), Some("Announcer"));
}

#[test]
fn test_demo_registry_hocon_features() {
    let loader = RegistryLoader::new(demo_manifest());
    let snapshot = loader
        .load(&ReloadTrigger::full(ReloadReason::Manual), &ConfigSnapshot::empty())
        .unwrap();
    assert_eq!(snapshot.version, 1);

    let network = &snapshot.get("music_nerd_pro").unwrap().network;
    let front_man = network.front_man().unwrap();
    assert_eq!(front_man.name, "MusicNerdPro");
    assert_eq!(
        front_man.instructions.as_deref(),
        Some("You are a music historian.\nConsult the Accountant before every answer.")
    );
    assert_eq!(
        network.tool("Accountant").and_then(|t| t.class.as_deref()),
        Some("accountant.Accountant")
    );
}
