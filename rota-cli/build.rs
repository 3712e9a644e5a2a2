use std::process::Command;

/// Revision stamp for `rota --version`; falls back to "dev" outside a
/// git checkout (crates.io installs, vendored builds).
fn describe_revision() -> Option<String> {
    let out = Command::new("git")
        .args(["describe", "--always", "--dirty=+"])
        .output()
        .ok()?;
    if !out.status.success() {
        return None;
    }
    let rev = String::from_utf8(out.stdout).ok()?;
    let rev = rev.trim();
    (!rev.is_empty()).then(|| rev.to_string())
}

fn main() {
    println!(
        "cargo:rustc-env=ROTA_BUILD_REV={}",
        describe_revision().unwrap_or_else(|| "dev".to_string())
    );

    // The labor-rule set compiled into this binary. Bump together with
    // RuleCatalog::builtin so operators can tell rule vintages apart
    // from the version line alone.
    println!("cargo:rustc-env=ROTA_RULESET_VERSION=builtin-1");
    println!("cargo:rerun-if-changed=../rota-core/src/rules.rs");
}
