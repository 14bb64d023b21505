use std::fs;

use tempfile::TempDir;


mod utils;
use utils::{fleet_config, provisioner, seed_sources, write_lines};

use armada::{
    envfile, FailurePolicy, FleetError, IdentitySource, InMemoryRuntime, Manifest, Provisioner,
    ProvisionerSpec, SourceError,
};

#[tokio::test]
async fn launch_persists_artifacts_and_starts_containers() -> eyre::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let dir = TempDir::new()?;
    let config = fleet_config(dir.path());
    write_lines(&config.names_file, &["a", "b"])?;
    write_lines(&config.beneficiaries_file, &["0xA", "0xB"])?;
    write_lines(&config.keys_file, &["kA", "kB"])?;

    let provisioner = provisioner(config.clone());
    let report = provisioner.launch(2).await?;

    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(report.skipped, 0);
    assert_eq!(provisioner.runtime().containers(), vec!["executor-1", "executor-2"]);

    let first = envfile::read(&config.env_file_path(1))?;
    assert_eq!(envfile::lookup(&first, "ENV"), Some("production"));
    assert_eq!(envfile::lookup(&first, "STRATEGY_EXECUTOR_DISPLAY_NAME"), Some("a"));
    assert_eq!(envfile::lookup(&first, "STRATEGY_EXECUTOR_BENEFICIARY"), Some("0xA"));
    assert_eq!(envfile::lookup(&first, "SIGNER_PRIVATE_KEY"), Some("kA"));
    assert_eq!(envfile::lookup(&first, "PROXY_IP"), None);

    let second = envfile::read(&config.env_file_path(2))?;
    assert_eq!(envfile::lookup(&second, "STRATEGY_EXECUTOR_DISPLAY_NAME"), Some("b"));

    let spec = provisioner.runtime().container("executor-1").expect("container started");
    assert_eq!(spec.published_port, Some((config.base_port, config.container_port)));
    assert_eq!(spec.network.as_deref(), Some(config.network.as_str()));

    let spec = provisioner.runtime().container("executor-2").expect("container started");
    assert_eq!(spec.published_port, Some((config.base_port + 1, config.container_port)));

    Ok(())
}

#[tokio::test]
async fn launch_rejects_insufficient_entries_before_side_effects() -> eyre::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let dir = TempDir::new()?;
    let config = fleet_config(dir.path());
    seed_sources(&config, 2)?;

    let provisioner = provisioner(config.clone());
    let err = provisioner.launch(3).await.expect_err("under-populated lists must fail");

    assert!(matches!(
        err,
        FleetError::Source(SourceError::InsufficientEntries { need: 3, have: 2, .. })
    ));
    assert_eq!(provisioner.runtime().pull_count(), 0);
    assert!(provisioner.runtime().containers().is_empty());
    assert!(!config.env_file_path(1).exists());

    Ok(())
}

#[tokio::test]
async fn launch_fails_on_missing_source_file() -> eyre::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let dir = TempDir::new()?;
    let config = fleet_config(dir.path());
    write_lines(&config.names_file, &["a"])?;
    write_lines(&config.beneficiaries_file, &["0xA"])?;
    // no keys file

    let provisioner = provisioner(config.clone());
    let err = provisioner.launch(1).await.expect_err("missing keys file must fail");

    match err {
        FleetError::Source(SourceError::MissingSource(path)) => {
            assert_eq!(path, config.keys_file);
        }
        other => panic!("expected MissingSource, got {other}"),
    }
    assert!(provisioner.runtime().containers().is_empty());

    Ok(())
}

#[tokio::test]
async fn image_pulled_once_per_batch() -> eyre::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let dir = TempDir::new()?;
    let config = fleet_config(dir.path());
    seed_sources(&config, 4)?;

    let provisioner = provisioner(config);
    let report = provisioner.launch(4).await?;

    assert_eq!(report.succeeded, 4);
    assert_eq!(provisioner.runtime().pull_count(), 1);

    Ok(())
}

#[tokio::test]
async fn proxy_rotation_wraps_around() -> eyre::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let dir = TempDir::new()?;
    let mut config = fleet_config(dir.path());
    seed_sources(&config, 3)?;

    let proxies_file = dir.path().join("proxies.txt");
    write_lines(&proxies_file, &["alice:secret@10.0.0.5:8080", "bob:hunter2@10.0.0.6:9090"])?;
    config.proxies_file = Some(proxies_file);

    let provisioner = provisioner(config.clone());
    let report = provisioner.launch(3).await?;
    assert_eq!(report.succeeded, 3);

    for (index, expected_host, expected_port) in
        [(1, "10.0.0.5", "8080"), (2, "10.0.0.6", "9090"), (3, "10.0.0.5", "8080")]
    {
        let pairs = envfile::read(&config.env_file_path(index))?;
        assert_eq!(envfile::lookup(&pairs, "PROXY_IP"), Some(expected_host));
        assert_eq!(envfile::lookup(&pairs, "PROXY_PORT"), Some(expected_port));
        assert_eq!(envfile::lookup(&pairs, "STRATEGY_EXECUTOR_IP_ADDRESS"), Some(expected_host));
    }

    let pairs = envfile::read(&config.env_file_path(1))?;
    assert_eq!(envfile::lookup(&pairs, "PROXY_USER"), Some("alice"));
    assert_eq!(envfile::lookup(&pairs, "PROXY_PASS"), Some("secret"));

    Ok(())
}

#[tokio::test]
async fn malformed_proxy_fails_the_launch() -> eyre::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let dir = TempDir::new()?;
    let mut config = fleet_config(dir.path());
    seed_sources(&config, 1)?;

    let proxies_file = dir.path().join("proxies.txt");
    write_lines(&proxies_file, &["not-a-proxy"])?;
    config.proxies_file = Some(proxies_file);

    let provisioner = provisioner(config);
    let err = provisioner.launch(1).await.expect_err("malformed descriptor must fail");

    assert!(matches!(err, FleetError::Proxy(_)));
    assert!(provisioner.runtime().containers().is_empty());

    Ok(())
}

#[tokio::test]
async fn identity_fetch_failure_aborts_the_batch() -> eyre::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let dir = TempDir::new()?;
    let mut config = fleet_config(dir.path());
    seed_sources(&config, 2)?;

    // nothing listens on the discard port, so every fetch fails
    config.identity_source = IdentitySource::Remote {
        url: "http://127.0.0.1:9/name".parse().expect("valid url"),
    };

    let provisioner = provisioner(config);
    let err = provisioner.launch(2).await.expect_err("unreachable identity endpoint");

    assert!(matches!(err, FleetError::Identity(_)));
    assert!(provisioner.runtime().containers().is_empty());

    Ok(())
}

#[tokio::test]
async fn delete_all_on_empty_working_set_is_a_noop() -> eyre::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let dir = TempDir::new()?;
    let config = fleet_config(dir.path());

    let provisioner = provisioner(config);
    let report = provisioner.delete_all().await?;

    assert_eq!(report.total(), 0);
    assert_eq!(provisioner.runtime().pull_count(), 0);

    Ok(())
}

#[tokio::test]
async fn delete_all_twice_is_idempotent() -> eyre::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let dir = TempDir::new()?;
    let config = fleet_config(dir.path());
    seed_sources(&config, 2)?;

    let provisioner = provisioner(config.clone());
    provisioner.launch(2).await?;

    let report = provisioner.delete_all().await?;
    assert_eq!(report.succeeded, 2);
    assert!(provisioner.runtime().containers().is_empty());
    assert!(!config.env_file_path(1).exists());
    assert!(!config.env_file_path(2).exists());
    assert!(!config.manifest_path().exists());
    assert!(!provisioner.runtime().has_image(&config.image));

    let report = provisioner.delete_all().await?;
    assert_eq!(report.total(), 0);

    Ok(())
}

#[tokio::test]
async fn update_all_tolerates_a_missing_container() -> eyre::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let dir = TempDir::new()?;
    let config = fleet_config(dir.path());
    seed_sources(&config, 3)?;

    let provisioner = provisioner(config);
    provisioner.launch(3).await?;

    // someone removed an instance behind our back
    provisioner.runtime().forget("executor-2");

    let report = provisioner.update_all().await?;
    assert_eq!(report.succeeded, 3);
    assert_eq!(report.failed, 0);
    assert_eq!(
        provisioner.runtime().containers(),
        vec!["executor-1", "executor-2", "executor-3"]
    );
    // one pull for launch, one refresh for the update
    assert_eq!(provisioner.runtime().pull_count(), 2);

    Ok(())
}

#[tokio::test]
async fn update_all_rediscovers_working_set_without_manifest() -> eyre::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let dir = TempDir::new()?;
    let config = fleet_config(dir.path());
    seed_sources(&config, 2)?;

    let provisioner = provisioner(config.clone());
    provisioner.launch(2).await?;

    fs::remove_file(config.manifest_path())?;

    let report = provisioner.update_all().await?;
    assert_eq!(report.succeeded, 2);

    Ok(())
}

#[tokio::test]
async fn launch_continue_policy_isolates_failures() -> eyre::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let dir = TempDir::new()?;
    let mut config = fleet_config(dir.path());
    config.failure_policy = FailurePolicy::Continue;
    seed_sources(&config, 3)?;

    let runtime = InMemoryRuntime::new();
    runtime.occupy("executor-2");

    let provisioner = Provisioner::new(config.clone(), runtime);
    let report = provisioner.launch(3).await?;

    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 1);

    let manifest = Manifest::load(&config.manifest_path())?.expect("manifest written");
    let indices: Vec<u32> = manifest.instances.iter().map(|entry| entry.index).collect();
    assert_eq!(indices, vec![1, 3]);

    Ok(())
}

#[tokio::test]
async fn launch_fail_fast_aborts_the_batch() -> eyre::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let dir = TempDir::new()?;
    let config = fleet_config(dir.path());
    seed_sources(&config, 3)?;

    let runtime = InMemoryRuntime::new();
    runtime.occupy("executor-2");

    let provisioner = Provisioner::new(config.clone(), runtime);
    provisioner.launch(3).await.expect_err("occupied name must abort the batch");

    // instance 1 started, instance 3 never attempted
    assert!(config.env_file_path(1).exists());
    assert!(!config.env_file_path(3).exists());

    // what did start is tracked for later cleanup
    let manifest = Manifest::load(&config.manifest_path())?.expect("manifest written");
    assert_eq!(manifest.instances.len(), 1);
    assert_eq!(manifest.instances[0].index, 1);

    Ok(())
}

#[tokio::test]
async fn logs_select_one_instance_or_all() -> eyre::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let dir = TempDir::new()?;
    let config = fleet_config(dir.path());
    seed_sources(&config, 2)?;

    let provisioner = provisioner(config);
    provisioner.launch(2).await?;

    let single = provisioner.logs(Some(1), 10).await?;
    assert!(single.contains("executor-1"));
    assert!(!single.contains("executor-2"));

    let all = provisioner.logs(None, 10).await?;
    assert!(all.contains("executor-1"));
    assert!(all.contains("executor-2"));

    let err = provisioner.logs(Some(7), 10).await.expect_err("unknown index");
    assert!(matches!(err, FleetError::UnknownInstance(7)));

    Ok(())
}

#[tokio::test]
async fn status_reports_tracked_and_untracked_containers() -> eyre::Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let dir = TempDir::new()?;
    let config = fleet_config(dir.path());
    seed_sources(&config, 1)?;

    let provisioner = provisioner(config);
    provisioner.launch(1).await?;
    provisioner.runtime().occupy("executor-9");

    let status = provisioner.status().await?;
    assert!(status.contains("executor-1"));
    assert!(status.contains("up"));
    assert!(status.contains("executor-9"));
    assert!(status.contains("untracked"));

    Ok(())
}
