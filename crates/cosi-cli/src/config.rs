//! Config files: group rosters and server keys
//!
//! A group file lists the cosigners of a collective; a server file holds
//! one server's keypair and listen address. Both are TOML with
//! capitalized keys, public keys hex-encoded.

use std::path::Path;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use cosi_core::suite::{Point, Scalar};
use cosi_core::tree::{Roster, ServerIdentity};

/// Default group definition file
pub const DEFAULT_GROUP_FILE: &str = "group.toml";

/// Default server configuration file
pub const DEFAULT_SERVER_CONFIG: &str = "config.toml";

/// One `[[servers]]` record of a group file
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GroupServer {
    pub addresses: Vec<String>,
    /// Hex-encoded public key
    pub public: String,
    #[serde(default)]
    pub description: String,
}

/// Group definition: the roster of a collective
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GroupConfig {
    #[serde(default)]
    pub servers: Vec<GroupServer>,
}

impl GroupConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading group definition {}", path.display()))?;
        let group: GroupConfig = toml::from_str(&content)
            .with_context(|| format!("parsing group definition {}", path.display()))?;
        if group.servers.is_empty() {
            bail!("empty or invalid group definition in {}", path.display());
        }
        Ok(group)
    }

    /// The roster in file order, first address of each server
    pub fn roster(&self) -> anyhow::Result<Roster> {
        let servers = self
            .servers
            .iter()
            .map(|server| {
                let address = server
                    .addresses
                    .first()
                    .with_context(|| format!("server {:?} has no address", server.description))?
                    .clone();
                let bytes = hex::decode(&server.public)
                    .with_context(|| format!("bad public key hex for {address}"))?;
                let public = Point::decode(&bytes)
                    .with_context(|| format!("bad public key for {address}"))?;
                Ok(ServerIdentity { address, public })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Roster::new(servers)?)
    }

    /// Short display names, one per server
    pub fn names(&self) -> Vec<String> {
        self.servers
            .iter()
            .map(|server| {
                let address = server.addresses.first().cloned().unwrap_or_default();
                let name = server.description.split(' ').next().unwrap_or_default();
                format!("{address}_{name}")
            })
            .collect()
    }
}

/// One server's keypair and listen address
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerConfig {
    pub address: String,
    /// Hex-encoded public key
    pub public: String,
    /// Hex-encoded private scalar
    pub private: String,
    #[serde(default)]
    pub description: String,
}

impl ServerConfig {
    /// Generate a fresh keypair for a server listening on `address`.
    ///
    /// The public key is `B*private`, matching the raw scalar the signer
    /// responds with.
    pub fn generate(address: String, description: String) -> Self {
        let private = Scalar::random(&mut rand::rngs::OsRng);
        let public = Point::mul_base(&private);
        ServerConfig {
            address,
            public: hex::encode(public.encode()),
            private: hex::encode(private.encode()),
            description,
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading server configuration {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("parsing server configuration {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("writing server configuration {}", path.display()))
    }

    /// Decode the keypair held by this configuration
    pub fn keypair(&self) -> anyhow::Result<(Scalar, Point)> {
        let private = Scalar::decode(&hex::decode(&self.private).context("bad private key hex")?)
            .context("bad private key")?;
        let public = Point::decode(&hex::decode(&self.public).context("bad public key hex")?)
            .context("bad public key")?;
        Ok((private, public))
    }

    /// The `[[servers]]` group-file record for this server
    pub fn group_record(&self) -> GroupServer {
        GroupServer {
            addresses: vec![self.address.clone()],
            public: self.public.clone(),
            description: self.description.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_file_round_trip() {
        let config = ServerConfig::generate("127.0.0.1:2000".into(), "conode 1".into());
        let group = GroupConfig {
            servers: vec![config.group_record()],
        };
        let text = toml::to_string_pretty(&group).unwrap();
        assert!(text.contains("[[servers]]"));
        assert!(text.contains("Addresses"));
        assert!(text.contains("Public"));

        let parsed: GroupConfig = toml::from_str(&text).unwrap();
        let roster = parsed.roster().unwrap();
        assert_eq!(roster.len(), 1);
        assert_eq!(roster.get(0).unwrap().address, "127.0.0.1:2000");
    }

    #[test]
    fn server_config_keypair_round_trip() {
        let config = ServerConfig::generate("127.0.0.1:2000".into(), String::new());
        let (private, public) = config.keypair().unwrap();
        assert_eq!(Point::mul_base(&private), public);
    }

    #[test]
    fn group_file_with_bad_public_rejected() {
        let text = r#"
            [[servers]]
            Addresses = ["127.0.0.1:2000"]
            Public = "zz"
            Description = "broken"
        "#;
        let parsed: GroupConfig = toml::from_str(text).unwrap();
        assert!(parsed.roster().is_err());
    }
}
