use tracing::{debug, info, warn};

use crate::descriptor::Descriptor;
use crate::edit;
use crate::error::Result;
use crate::model::DeployConfig;

/// Deploy timeout used while a release may be running schema migrations.
pub const ELEVATED_DEPLOY_TIMEOUT: u64 = 120;

/// What [`apply_temporary_config`] changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemporaryChange {
    pub old_address: String,
    pub new_address: String,
    pub old_timeout: u64,
    pub address_changed: bool,
    pub replacements: usize,
}

/// Points the descriptor at `new_address` and raises the deploy timeout.
///
/// Both edits land in one write, after which the descriptor is reloaded
/// from disk. The edited text is parsed before it is written: if it would
/// not carry the new address and the elevated timeout, the file is left
/// untouched and `ConfigError::NotApplied` is returned. The address change
/// is permanent; the timeout is undone by [`restore_timeout`].
pub async fn apply_temporary_config(
    descriptor: &mut Descriptor,
    new_address: &str,
) -> Result<TemporaryChange> {
    let old_address = descriptor.primary_address()?.to_string();
    let old_timeout = descriptor.deploy_timeout();
    info!("Old timeout was set to {} seconds", old_timeout);

    let (raw, replacements) = edit::substitute_address(descriptor.raw(), &old_address, new_address);
    debug!(replacements, "Substituted server address");

    let (raw, timeout_lines) = edit::set_deploy_timeout(&raw, ELEVATED_DEPLOY_TIMEOUT);
    let raw = if timeout_lines > 0 {
        raw
    } else if descriptor.config().deploy_timeout.is_some() {
        // Set, but not as a plain `deploy_timeout: <int>` line we can rewrite.
        return Err(descriptor.not_applied("deploy_timeout"));
    } else {
        edit::upsert_deploy_timeout(&raw, ELEVATED_DEPLOY_TIMEOUT)
    };

    let candidate = descriptor.preview(&raw)?;
    ensure_applied(descriptor, &candidate, new_address, ELEVATED_DEPLOY_TIMEOUT)?;

    descriptor.write_and_reload(raw).await?;
    ensure_applied(descriptor, descriptor.config(), new_address, ELEVATED_DEPLOY_TIMEOUT)?;

    info!(
        "Updated {} with new IP and timeout (timeout is now {} seconds)",
        descriptor.path().display(),
        descriptor.deploy_timeout()
    );

    Ok(TemporaryChange {
        address_changed: old_address != new_address,
        old_address,
        new_address: new_address.to_string(),
        old_timeout,
        replacements,
    })
}

fn ensure_applied(
    descriptor: &Descriptor,
    config: &DeployConfig,
    address: &str,
    timeout: u64,
) -> Result<()> {
    if config.web_hosts().first().map(String::as_str) != Some(address) {
        warn!(
            expected = %address,
            "servers.web[0] does not hold the new address after editing"
        );
        return Err(descriptor.not_applied("servers.web"));
    }
    if config.deploy_timeout != Some(timeout) {
        return Err(descriptor.not_applied("deploy_timeout"));
    }
    Ok(())
}

/// Puts the load-time deploy timeout back and ensures a trailing newline.
pub async fn restore_timeout(descriptor: &mut Descriptor) -> Result<()> {
    let original = descriptor.baseline_timeout();
    let (raw, _) = edit::set_deploy_timeout(descriptor.raw(), original);
    let raw = edit::ensure_trailing_newline(&raw);
    descriptor.write_and_reload(raw).await?;

    if descriptor.config().deploy_timeout != Some(original) {
        return Err(descriptor.not_applied("deploy_timeout"));
    }

    info!("Restored timeout configuration to {} seconds", original);
    Ok(())
}

/// Rewrites every `- <ipv4>` entry to `address`, leaving the timeout alone.
pub async fn sync_listed_addresses(descriptor: &mut Descriptor, address: &str) -> Result<usize> {
    let (raw, count) = edit::replace_listed_addresses(descriptor.raw(), address);
    if count > 0 {
        descriptor.write_and_reload(raw).await?;
    }
    info!(
        "{} updated with instance IP: {} ({} entries)",
        descriptor.path().display(),
        address,
        count
    );
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use std::path::PathBuf;
    use tempfile::TempDir;
    use tokio::fs;

    const DEPLOY_YML: &str = "\
service: shop
image: acme/shop

servers:
  web:
    - 1.2.3.4

proxy:
  ssl: true
  host: app.example.com

# bump when migrations are slow
deploy_timeout: 30
";

    async fn descriptor_with(content: &str) -> (TempDir, PathBuf, Descriptor) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("deploy.yml");
        fs::write(&path, content).await.unwrap();
        let descriptor = Descriptor::load(&path).await.unwrap();
        (dir, path, descriptor)
    }

    #[tokio::test]
    async fn test_apply_then_restore() {
        let (_dir, path, mut descriptor) = descriptor_with(DEPLOY_YML).await;

        let change = apply_temporary_config(&mut descriptor, "5.6.7.8")
            .await
            .unwrap();
        assert_eq!(change.old_address, "1.2.3.4");
        assert_eq!(change.old_timeout, 30);
        assert!(change.address_changed);
        assert_eq!(change.replacements, 1);

        let on_disk = fs::read_to_string(&path).await.unwrap();
        assert!(on_disk.contains("    - 5.6.7.8\n"));
        assert!(on_disk.contains("deploy_timeout: 120\n"));
        assert_eq!(descriptor.primary_address().unwrap(), "5.6.7.8");
        assert_eq!(descriptor.deploy_timeout(), 120);

        restore_timeout(&mut descriptor).await.unwrap();

        let on_disk = fs::read_to_string(&path).await.unwrap();
        assert_eq!(on_disk, DEPLOY_YML.replace("1.2.3.4", "5.6.7.8"));
        assert_eq!(descriptor.deploy_timeout(), 30);
        assert_eq!(descriptor.primary_address().unwrap(), "5.6.7.8");
    }

    #[tokio::test]
    async fn test_restore_is_byte_identical_with_same_address() {
        let (_dir, path, mut descriptor) = descriptor_with(DEPLOY_YML).await;

        let change = apply_temporary_config(&mut descriptor, "1.2.3.4")
            .await
            .unwrap();
        assert!(!change.address_changed);

        restore_timeout(&mut descriptor).await.unwrap();
        assert_eq!(fs::read_to_string(&path).await.unwrap(), DEPLOY_YML);
    }

    #[tokio::test]
    async fn test_missing_timeout_is_appended_then_restored_to_default() {
        let content = "servers:\n  web:\n    - 1.2.3.4\nproxy:\n  host: app.example.com";
        let (_dir, path, mut descriptor) = descriptor_with(content).await;

        apply_temporary_config(&mut descriptor, "5.6.7.8")
            .await
            .unwrap();
        let on_disk = fs::read_to_string(&path).await.unwrap();
        assert!(on_disk.ends_with("\ndeploy_timeout: 120\n"));
        assert_eq!(on_disk.matches("deploy_timeout").count(), 1);

        restore_timeout(&mut descriptor).await.unwrap();
        let on_disk = fs::read_to_string(&path).await.unwrap();
        assert!(on_disk.ends_with("\ndeploy_timeout: 30\n"));
        assert_eq!(descriptor.deploy_timeout(), 30);
    }

    #[tokio::test]
    async fn test_timeout_digits_survive_address_substitution() {
        let content = "servers:\n  web:\n    - 10.0.0.1\ndeploy_timeout: 100\n";
        let (_dir, path, mut descriptor) = descriptor_with(content).await;

        apply_temporary_config(&mut descriptor, "10.0.0.2")
            .await
            .unwrap();
        restore_timeout(&mut descriptor).await.unwrap();

        assert_eq!(
            fs::read_to_string(&path).await.unwrap(),
            "servers:\n  web:\n    - 10.0.0.2\ndeploy_timeout: 100\n"
        );
    }

    #[tokio::test]
    async fn test_templated_web_host_is_rejected_without_writing() {
        std::env::set_var("DEPLOYCTL_TEST_WEB_HOST", "1.2.3.4");
        let content = "servers:\n  web:\n    - <%= ENV[\"DEPLOYCTL_TEST_WEB_HOST\"] %>\nproxy:\n  host: app.example.com\ndeploy_timeout: 30\n";
        let (_dir, path, mut descriptor) = descriptor_with(content).await;
        assert_eq!(descriptor.primary_address().unwrap(), "1.2.3.4");

        let err = apply_temporary_config(&mut descriptor, "5.6.7.8")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::NotApplied { field: "servers.web", .. }
        ));
        assert_eq!(fs::read_to_string(&path).await.unwrap(), content);
        assert_eq!(descriptor.deploy_timeout(), 30);
    }

    #[tokio::test]
    async fn test_space_before_colon_is_elevated_and_restored() {
        let content = "servers:\n  web:\n    - 1.2.3.4\ndeploy_timeout : 30\n";
        let (_dir, path, mut descriptor) = descriptor_with(content).await;

        apply_temporary_config(&mut descriptor, "5.6.7.8")
            .await
            .unwrap();
        let on_disk = fs::read_to_string(&path).await.unwrap();
        assert_eq!(on_disk.matches("deploy_timeout").count(), 1);
        assert!(on_disk.contains("deploy_timeout : 120\n"));
        assert_eq!(descriptor.deploy_timeout(), 120);

        restore_timeout(&mut descriptor).await.unwrap();
        assert_eq!(
            fs::read_to_string(&path).await.unwrap(),
            "servers:\n  web:\n    - 5.6.7.8\ndeploy_timeout : 30\n"
        );
    }

    #[tokio::test]
    async fn test_templated_timeout_is_rejected_without_writing() {
        let content = "servers:\n  web:\n    - 1.2.3.4\ndeploy_timeout: <%= ENV.fetch(\"DEPLOYCTL_TEST_TIMEOUT\", 45) %>\n";
        let (_dir, path, mut descriptor) = descriptor_with(content).await;
        assert_eq!(descriptor.deploy_timeout(), 45);

        let err = apply_temporary_config(&mut descriptor, "5.6.7.8")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::NotApplied { field: "deploy_timeout", .. }
        ));
        assert_eq!(fs::read_to_string(&path).await.unwrap(), content);
    }

    #[tokio::test]
    async fn test_sync_listed_addresses() {
        let (_dir, path, mut descriptor) = descriptor_with(DEPLOY_YML).await;

        let count = sync_listed_addresses(&mut descriptor, "9.9.9.9")
            .await
            .unwrap();
        assert_eq!(count, 1);

        let on_disk = fs::read_to_string(&path).await.unwrap();
        assert!(on_disk.contains("    - 9.9.9.9\n"));
        assert!(on_disk.contains("deploy_timeout: 30\n"));
    }
}
