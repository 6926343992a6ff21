//! Test vector generator for signed withdrawals.
//!
//! Generates `test_vectors.json` with keccak-256 hashes, key-to-address
//! derivations and signed withdrawal payloads, all from fixed keys. Other
//! implementations of the withdrawal signature scheme check themselves
//! against this file.
//!
//! Usage:
//!   rail-testvec              # Generate tests/fixtures/test_vectors.json
//!   rail-testvec --verify     # Verify the file matches freshly generated vectors

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use rail_crypto::keccak;
use rail_crypto::secp256k1::{self, SigningKey};
use rail_types::{tokens, Address, U256};
use rail_vault::signature::{sign_withdrawal, withdraw_payload};
use serde::{Deserialize, Serialize};

const VECTORS_PATH: &str = "tests/fixtures/test_vectors.json";

#[derive(Serialize, Deserialize)]
struct TestVectors {
    version: String,
    generated_by: String,
    vectors: BTreeMap<String, TestVector>,
}

#[derive(Serialize, Deserialize)]
struct TestVector {
    description: String,
    inputs: BTreeMap<String, String>,
    outputs: BTreeMap<String, String>,
}

/// Deterministic key: 31 zero bytes followed by `seed`.
fn fixed_key(seed: u8) -> anyhow::Result<SigningKey> {
    let mut bytes = [0u8; 32];
    bytes[31] = seed;
    SigningKey::from_bytes(&bytes).with_context(|| format!("fixed key {seed}"))
}

fn hex_key(key: &SigningKey) -> String {
    hex::encode(*key.to_bytes())
}

fn generate_keccak_vectors() -> BTreeMap<String, TestVector> {
    let mut vectors = BTreeMap::new();

    vectors.insert(
        "keccak256_empty".to_string(),
        TestVector {
            description: "keccak256(\"\")".to_string(),
            inputs: BTreeMap::from([("data".to_string(), String::new())]),
            outputs: BTreeMap::from([("hash".to_string(), hex::encode(keccak::hash(b"")))]),
        },
    );

    let message = b"rail withdraw";
    vectors.insert(
        "keccak256_personal_message".to_string(),
        TestVector {
            description: "keccak256(\"\\x19Ethereum Signed Message:\\n13\" || \"rail withdraw\")"
                .to_string(),
            inputs: BTreeMap::from([("message".to_string(), hex::encode(message))]),
            outputs: BTreeMap::from([(
                "hash".to_string(),
                hex::encode(keccak::personal_message_hash(message)),
            )]),
        },
    );

    vectors
}

fn generate_address_vectors() -> anyhow::Result<BTreeMap<String, TestVector>> {
    let mut vectors = BTreeMap::new();

    for seed in 1..=3u8 {
        let key = fixed_key(seed)?;
        vectors.insert(
            format!("secp256k1_address_{seed}"),
            TestVector {
                description: format!("Address of the secp256k1 key with scalar {seed}"),
                inputs: BTreeMap::from([("secret_key".to_string(), hex_key(&key))]),
                outputs: BTreeMap::from([("address".to_string(), key.address().to_string())]),
            },
        );
    }

    Ok(vectors)
}

fn generate_withdraw_vectors() -> anyhow::Result<BTreeMap<String, TestVector>> {
    let mut vectors = BTreeMap::new();
    let vault = Address::repeat_byte(0x77);

    // (name, key seed, recipient byte, amount, withdrawn so far)
    let cases = [
        ("withdraw_signed_amount", 1u8, 0x99u8, tokens(10), U256::zero()),
        ("withdraw_signed_all", 2, 0x98, U256::zero(), U256::zero()),
        ("withdraw_signed_after_withdrawal", 3, 0x97, tokens(1), tokens(5)),
    ];

    for (name, seed, recipient_byte, amount, withdrawn) in cases {
        let key = fixed_key(seed)?;
        let recipient = Address::repeat_byte(recipient_byte);
        let payload = withdraw_payload(recipient, amount, vault, withdrawn);
        let signature = sign_withdrawal(&key, recipient, amount, vault, withdrawn)
            .with_context(|| format!("sign {name}"))?;

        vectors.insert(
            name.to_string(),
            TestVector {
                description: "Personal-message signature over recipient || amount || vault || withdrawn"
                    .to_string(),
                inputs: BTreeMap::from([
                    ("secret_key".to_string(), hex_key(&key)),
                    ("recipient".to_string(), recipient.to_string()),
                    ("amount".to_string(), amount.to_string()),
                    ("vault".to_string(), vault.to_string()),
                    ("withdrawn".to_string(), withdrawn.to_string()),
                ]),
                outputs: BTreeMap::from([
                    ("payload".to_string(), hex::encode(&payload)),
                    (
                        "message_hash".to_string(),
                        hex::encode(keccak::personal_message_hash(&payload)),
                    ),
                    ("signature".to_string(), hex::encode(signature)),
                    ("signer".to_string(), key.address().to_string()),
                ]),
            },
        );
    }

    Ok(vectors)
}

fn generate_all_vectors() -> anyhow::Result<TestVectors> {
    let mut all_vectors = BTreeMap::new();

    all_vectors.extend(generate_keccak_vectors());
    all_vectors.extend(generate_address_vectors()?);
    all_vectors.extend(generate_withdraw_vectors()?);

    Ok(TestVectors {
        version: "1.0".to_string(),
        generated_by: "rail-testvec".to_string(),
        vectors: all_vectors,
    })
}

/// Signature outputs must recover to the recorded signer.
fn signature_recovers(vector: &TestVector) -> bool {
    let (Some(payload), Some(signature), Some(signer)) = (
        vector.outputs.get("payload"),
        vector.outputs.get("signature"),
        vector.outputs.get("signer"),
    ) else {
        return true;
    };
    let (Ok(payload), Ok(signature), Ok(signer)) = (
        hex::decode(payload),
        hex::decode(signature),
        signer.parse::<Address>(),
    ) else {
        return false;
    };
    secp256k1::recover_message_signer(&payload, &signature).is_ok_and(|a| a == signer)
}

fn verify_vectors(vectors: &TestVectors) -> anyhow::Result<bool> {
    let regenerated = generate_all_vectors()?;
    let mut all_pass = true;

    for (name, expected) in &vectors.vectors {
        match regenerated.vectors.get(name) {
            Some(actual) if actual.outputs != expected.outputs => {
                eprintln!("FAIL: {name}");
                eprintln!("  expected: {:?}", expected.outputs);
                eprintln!("  actual:   {:?}", actual.outputs);
                all_pass = false;
            }
            Some(_) if !signature_recovers(expected) => {
                eprintln!("FAIL: {name} (signature does not recover to signer)");
                all_pass = false;
            }
            Some(_) => eprintln!("PASS: {name}"),
            None => {
                eprintln!("MISSING: {name}");
                all_pass = false;
            }
        }
    }

    Ok(all_pass)
}

fn write_vectors(vectors: &TestVectors, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(vectors)?;
    std::fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
    eprintln!("Generated {} test vectors to {}", vectors.vectors.len(), path.display());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let verify = std::env::args().any(|a| a == "--verify");
    let path = Path::new(VECTORS_PATH);

    let vectors = if verify && path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read {}", path.display()))?;
        serde_json::from_str(&content).context("parse test vectors")?
    } else {
        if verify {
            eprintln!("No existing test vectors found at {}. Generating...", path.display());
        }
        let vectors = generate_all_vectors()?;
        write_vectors(&vectors, path)?;
        vectors
    };

    if verify_vectors(&vectors)? {
        eprintln!("All test vectors verified successfully.");
        Ok(())
    } else {
        anyhow::bail!("test vector verification failed")
    }
}
