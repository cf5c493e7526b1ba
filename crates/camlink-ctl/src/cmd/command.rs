//! `move` and `sync`: talk to the producer's command channel directly.

use anyhow::{Context, Result, bail};

use camlink_core::Direction;
use camlink_services::CommandClient;

pub async fn cmd_move(client: &CommandClient, token: &str) -> Result<()> {
    let Some(direction) = Direction::from_token(token) else {
        bail!("unknown direction {token:?}; expected left, right, up or down");
    };
    let coords = client
        .send_direction(direction)
        .await
        .with_context(|| format!("move {direction} via {} failed", client.addr()))?;
    println!("moved {direction} -> ({}, {})", coords.x, coords.y);
    Ok(())
}

pub async fn cmd_sync(client: &CommandClient) -> Result<()> {
    let coords = client
        .sync()
        .await
        .with_context(|| format!("sync via {} failed", client.addr()))?;
    println!("cursor at ({}, {})", coords.x, coords.y);
    Ok(())
}
