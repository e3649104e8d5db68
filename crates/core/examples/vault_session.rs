//! Example: A working session against an on-disk vault.
//!
//! Walks the core protocol end to end: open a vault, register members,
//! register a file, run the edit cycle (acquire, commit, release) and
//! print the resulting history.
//!
//! Usage:
//!   cargo run -p asset-vault-core --example vault_session

use asset_vault_core::{FinalCommit, Vault, VersionClaim};
use asset_vault_model::{Member, MemberId, SheetName, SheetPath, VaultConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let dir = tempfile::tempdir()?;
    println!("Opening vault in {:?}...", dir.path());

    let root_id: MemberId = MemberId::parse("root")?;
    let config: VaultConfig = VaultConfig::new("example-vault").with_administrator(root_id.clone());
    let vault: Vault = Vault::open(dir.path(), config).await?;
    let root = vault.actor(&root_id)?;

    // Register two members and give each a working sheet.
    for name in ["alice", "bob"] {
        vault
            .register_member(&root, Member::new(MemberId::parse(name)?))
            .await?;
        let member = vault.actor(&MemberId::parse(name)?)?;
        vault
            .create_sheet(&member, SheetName::parse(&format!("{name}-main"))?)
            .await?;
    }

    // Alice registers a file. She holds it right away, so the first
    // commit needs no separate acquire.
    let alice = vault.actor(&MemberId::parse("alice")?)?;
    let sheet: SheetName = SheetName::parse("alice-main")?;
    let (id, v1) = vault
        .register(&alice, &sheet, SheetPath::parse("props/rock.png")?, b"rock v1", "blockout")
        .await?;
    println!("Registered file {id} at version {}", v1.sequence);

    vault.commit(&alice, id, b"rock v2", "high poly pass").await?;
    vault
        .release(&alice, id, Some(FinalCommit::new(b"rock v3".as_slice(), "bake")))
        .await?;
    println!("Alice published three versions and released the hold");

    // Share it through the reference sheet so bob can pick it up.
    vault
        .add_mapping(&root, &SheetName::parse("reference")?, SheetPath::parse("props/rock.png")?, id)
        .await?;

    let bob = vault.actor(&MemberId::parse("bob")?)?;
    let record = vault.lookup(&bob, id).await?;
    let hold = vault.acquire(&bob, id, &VersionClaim::current(&record)).await?;
    println!("Bob acquired the file at version {}", hold.version);
    vault.commit(&bob, id, b"rock v4", "texture pass").await?;
    vault.release(&bob, id, None).await?;

    println!("\nHistory of {id}:");
    for version in vault.history(&bob, id).await?.iter() {
        println!(
            "  v{} by {} - {}",
            version.sequence, version.author, version.description
        );
    }

    Ok(())
}
