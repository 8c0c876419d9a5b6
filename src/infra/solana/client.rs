// Responsible for all communication with the Solana blockchain.

use async_trait::async_trait;
use primitive_types::H256;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_program::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};
use solana_sdk::{
    commitment_config::CommitmentConfig,
    signer::{keypair::read_keypair_file, keypair::Keypair, Signer},
    transaction::Transaction,
};
use std::str::FromStr;

use crate::domain::ledger::{
    AnchorReceipt, AnchorRequest, BatchAnchorRequest, LedgerError, LedgerGateway, LedgerRecord,
    LedgerStats,
};
use crate::infra::config;

// Instruction discriminators of the certificate registry program.
const REGISTER_DISCRIMINATOR: [u8; 8] = [211, 124, 67, 15, 211, 194, 178, 240];
const REGISTER_BATCH_DISCRIMINATOR: [u8; 8] = [91, 22, 240, 153, 84, 200, 101, 49];
const REVOKE_DISCRIMINATOR: [u8; 8] = [170, 23, 31, 34, 133, 173, 93, 242];

// On-chain account layouts (must match the deployed program):
// certificate PDA: 8-byte discriminator, 32-byte hash, 1-byte valid flag,
//   i64 anchored_at, i64 start, i64 end, then u32-length-prefixed strings
//   for student id, university code, company code and revoke reason
//   (length 0 means no reason).
// stats PDA: 8-byte discriminator, u64 total, u64 active, u64 revoked.

pub struct SolanaLedger {
    rpc_url: String,
    program_id: Pubkey,
    keypair_path: String,
    chain_id: String,
}

impl SolanaLedger {
    /// Builds the gateway from the environment.
    pub fn from_env() -> anyhow::Result<Self> {
        let program_id = Pubkey::from_str(&config::solana_program_id())?;
        Ok(Self {
            rpc_url: config::solana_rpc_url(),
            program_id,
            keypair_path: config::solana_keypair_path(),
            chain_id: config::chain_id(),
        })
    }

    fn client(&self) -> RpcClient {
        RpcClient::new_with_commitment(self.rpc_url.clone(), CommitmentConfig::confirmed())
    }

    fn payer(&self) -> Result<Keypair, LedgerError> {
        read_keypair_file(&*shellexpand::tilde(&self.keypair_path))
            .map_err(|e| LedgerError::Network(format!("failed to read keypair file: {}", e)))
    }

    /// Each certificate gets a deterministic PDA seeded by its hash, so the
    /// registry is addressable without an index.
    fn certificate_pda(&self, cert_hash: H256) -> Pubkey {
        let (pda, _bump) = Pubkey::find_program_address(
            &[b"certificate", cert_hash.as_bytes()],
            &self.program_id,
        );
        pda
    }

    fn stats_pda(&self) -> Pubkey {
        let (pda, _bump) = Pubkey::find_program_address(&[b"ledger_stats"], &self.program_id);
        pda
    }

    async fn send(&self, instruction: Instruction) -> Result<AnchorReceipt, LedgerError> {
        let client = self.client();
        let payer = self.payer()?;

        let mut transaction =
            Transaction::new_with_payer(&[instruction], Some(&payer.pubkey()));
        let recent_blockhash = client
            .get_latest_blockhash()
            .await
            .map_err(|e| map_client_error(&e.to_string()))?;
        transaction.sign(&[&payer], recent_blockhash);

        let signature = client
            .send_and_confirm_transaction(&transaction)
            .await
            .map_err(|e| map_client_error(&e.to_string()))?;
        let slot = client
            .get_slot()
            .await
            .map_err(|e| map_client_error(&e.to_string()))?;

        println!(
            "> SolanaLedger: confirmed transaction {} at slot {}",
            signature, slot
        );
        Ok(AnchorReceipt {
            tx_hash: signature.to_string(),
            block_number: slot,
        })
    }
}

#[async_trait]
impl LedgerGateway for SolanaLedger {
    async fn is_available(&self) -> bool {
        self.client().get_health().await.is_ok()
    }

    fn chain_id(&self) -> String {
        self.chain_id.clone()
    }

    async fn submit(&self, req: &AnchorRequest) -> Result<AnchorReceipt, LedgerError> {
        let payer = self.payer()?;
        let certificate_pda = self.certificate_pda(req.cert_hash);

        let accounts = vec![
            AccountMeta::new(certificate_pda, false),
            AccountMeta::new(self.stats_pda(), false),
            AccountMeta::new(payer.pubkey(), true),
            AccountMeta::new_readonly(solana_program::system_program::ID, false),
        ];

        let mut data = REGISTER_DISCRIMINATOR.to_vec();
        data.extend_from_slice(&req.cert_hash.to_fixed_bytes());
        data.extend_from_slice(&req.start_unix.to_le_bytes());
        data.extend_from_slice(&req.end_unix.to_le_bytes());
        write_str(&mut data, &req.student_address);
        write_str(&mut data, &req.student_id);
        write_str(&mut data, &req.university_code);
        write_str(&mut data, &req.company_code);

        self.send(Instruction {
            program_id: self.program_id,
            accounts,
            data,
        })
        .await
    }

    async fn submit_batch(&self, req: &BatchAnchorRequest) -> Result<AnchorReceipt, LedgerError> {
        let payer = self.payer()?;

        // One PDA per entry, all created in one transaction. The program
        // fails the whole transaction when any entry is invalid.
        let mut accounts = vec![
            AccountMeta::new(self.stats_pda(), false),
            AccountMeta::new(payer.pubkey(), true),
            AccountMeta::new_readonly(solana_program::system_program::ID, false),
        ];
        for entry in &req.entries {
            accounts.push(AccountMeta::new(self.certificate_pda(entry.cert_hash), false));
        }

        let mut data = REGISTER_BATCH_DISCRIMINATOR.to_vec();
        write_str(&mut data, &req.university_code);
        write_str(&mut data, &req.company_code);
        data.extend_from_slice(&(req.entries.len() as u32).to_le_bytes());
        for entry in &req.entries {
            data.extend_from_slice(&entry.cert_hash.to_fixed_bytes());
            data.extend_from_slice(&entry.start_unix.to_le_bytes());
            data.extend_from_slice(&entry.end_unix.to_le_bytes());
            write_str(&mut data, &entry.student_address);
            write_str(&mut data, &entry.student_id);
        }

        self.send(Instruction {
            program_id: self.program_id,
            accounts,
            data,
        })
        .await
    }

    async fn query(&self, cert_hash: H256) -> Result<Option<LedgerRecord>, LedgerError> {
        let client = self.client();
        let certificate_pda = self.certificate_pda(cert_hash);

        let account = match client.get_account(&certificate_pda).await {
            Ok(account) => account,
            // A missing PDA means the hash was never anchored here.
            Err(e) if e.to_string().contains("AccountNotFound") => return Ok(None),
            Err(e) => return Err(map_client_error(&e.to_string())),
        };

        parse_certificate_account(&account.data)
            .map(Some)
            .map_err(LedgerError::Network)
    }

    async fn revoke(&self, cert_hash: H256, reason: &str) -> Result<String, LedgerError> {
        let payer = self.payer()?;
        let certificate_pda = self.certificate_pda(cert_hash);

        let accounts = vec![
            AccountMeta::new(certificate_pda, false),
            AccountMeta::new(self.stats_pda(), false),
            AccountMeta::new(payer.pubkey(), true),
        ];

        let mut data = REVOKE_DISCRIMINATOR.to_vec();
        data.extend_from_slice(&cert_hash.to_fixed_bytes());
        write_str(&mut data, reason);

        let receipt = self
            .send(Instruction {
                program_id: self.program_id,
                accounts,
                data,
            })
            .await?;
        Ok(receipt.tx_hash)
    }

    async fn statistics(&self) -> Result<LedgerStats, LedgerError> {
        let client = self.client();
        let account = client
            .get_account(&self.stats_pda())
            .await
            .map_err(|e| map_client_error(&e.to_string()))?;

        let data = account.data;
        // 8-byte discriminator + three u64 counters.
        if data.len() < 32 {
            return Err(LedgerError::Network("stats account data too short".to_string()));
        }
        Ok(LedgerStats {
            total: read_u64(&data[8..16]),
            active: read_u64(&data[16..24]),
            revoked: read_u64(&data[24..32]),
        })
    }
}

fn write_str(data: &mut Vec<u8>, s: &str) {
    data.extend_from_slice(&(s.len() as u32).to_le_bytes());
    data.extend_from_slice(s.as_bytes());
}

fn read_u64(slice: &[u8]) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(slice);
    u64::from_le_bytes(bytes)
}

fn read_i64(slice: &[u8]) -> i64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(slice);
    i64::from_le_bytes(bytes)
}

fn map_client_error(msg: &str) -> LedgerError {
    // Program-level rejections carry a custom error code; anything else is
    // transport trouble.
    if msg.contains("custom program error") {
        LedgerError::Rejected(msg.to_string())
    } else {
        LedgerError::Network(msg.to_string())
    }
}

fn parse_certificate_account(data: &[u8]) -> Result<LedgerRecord, String> {
    // Fixed header: discriminator + hash + valid flag + three i64 fields.
    const HEADER: usize = 8 + 32 + 1 + 8 + 8 + 8;
    if data.len() < HEADER {
        return Err("certificate account data too short".to_string());
    }
    let mut hash_bytes = [0u8; 32];
    hash_bytes.copy_from_slice(&data[8..40]);
    let valid = data[40] == 1;
    let anchored_at = read_i64(&data[41..49]);
    let start_unix = read_i64(&data[49..57]);
    let end_unix = read_i64(&data[57..65]);

    let mut cursor = HEADER;
    let student_id = read_prefixed_str(data, &mut cursor)?;
    let university_code = read_prefixed_str(data, &mut cursor)?;
    let company_code = read_prefixed_str(data, &mut cursor)?;
    let reason = read_prefixed_str(data, &mut cursor)?;

    Ok(LedgerRecord {
        cert_hash: H256::from(hash_bytes),
        student_id,
        university_code,
        company_code,
        start_unix,
        end_unix,
        valid,
        anchored_at,
        revoke_reason: if reason.is_empty() { None } else { Some(reason) },
    })
}

fn read_prefixed_str(data: &[u8], cursor: &mut usize) -> Result<String, String> {
    if data.len() < *cursor + 4 {
        return Err("certificate account data truncated".to_string());
    }
    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&data[*cursor..*cursor + 4]);
    let len = u32::from_le_bytes(len_bytes) as usize;
    *cursor += 4;
    if data.len() < *cursor + len {
        return Err("certificate account string truncated".to_string());
    }
    let s = String::from_utf8(data[*cursor..*cursor + len].to_vec())
        .map_err(|e| format!("certificate account string not utf-8: {}", e))?;
    *cursor += len;
    Ok(s)
}
