//! Claim-code commands.

use std::time::Duration;

use anyhow::{Context, Result};
use scain_kernel::core::now_millis;
use scain_kernel::{ClaimCode, DeviceId, DeviceType, Scain};

pub async fn issue(
    scain: &Scain,
    device_type: DeviceType,
    count: usize,
    ttl_hours: Option<u64>,
) -> Result<()> {
    let ttl = ttl_hours.map(|h| Duration::from_secs(h.saturating_mul(3600)));
    let codes = scain
        .claims()
        .issue(device_type, count, ttl)
        .await
        .context("failed to issue claim codes")?;

    for claim in &codes {
        println!("{}", claim.code);
    }
    Ok(())
}

pub async fn claim(
    scain: &Scain,
    code: &str,
    device_type: DeviceType,
    device_id: Option<String>,
) -> Result<()> {
    let now = now_millis();
    let device = match device_id {
        Some(id) => {
            scain
                .claims()
                .redeem(code, device_type, DeviceId::new(id), now)
                .await
        }
        None => scain.claims().claim_device(code, device_type, now).await,
    };

    let device = device.with_context(|| format!("cannot claim {code}"))?;
    println!("{device}");
    Ok(())
}

pub async fn list(scain: &Scain, device_type: Option<DeviceType>, json: bool) -> Result<()> {
    let codes = scain.claims().list(device_type).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&codes)?);
        return Ok(());
    }

    println!(
        "{:<10} {:<12} {:<9} {:<15} {}",
        "CODE", "TYPE", "STATUS", "EXPIRES", "REDEEMED BY"
    );
    for claim in &codes {
        println!("{}", table_row(claim));
    }
    Ok(())
}

fn table_row(claim: &ClaimCode) -> String {
    let expires = claim
        .expires_at
        .map_or_else(|| "never".to_string(), |t| t.to_string());
    let redeemed_by = claim.redeemed_by.as_ref().map_or("-", DeviceId::as_str);
    format!(
        "{:<10} {:<12} {:<9} {:<15} {}",
        claim.code.as_str(),
        claim.device_type.as_str(),
        claim.status.as_str(),
        expires,
        redeemed_by
    )
}
