//! This example runs the whole programmable object workflow against a live API:
//! 1. Submitting a generation for an object name and description.
//! 2. Long-polling until the submitted version is final.
//! 3. Downloading the resulting GLB and, optionally, saving it to a directory.
//! 4. Registering the object with the debug rooms endpoint.
//!
//! The API base URL is read from `OBJGEN_API_BASE_URL` (a `.env` file works too).
//!
//! Usage:
//! `cargo run --example programmable_object -- [NAME] [DESCRIPTION] [MODEL] [OUT_DIR]`

use objgen::{DebugRoomRegistration, ObjgenClient, WaitOptions, DEFAULT_LANGUAGE_MODEL};
use std::env;
use tracing_subscriber::fmt::time::Uptime;

const DEFAULT_NAME: &str = "戰鬥機";
const DEFAULT_DESCRIPTION: &str = "一架現代噴射戰鬥機的 3D 物件：流線型機身與尖鼻錐，後掠主翼與尾翼，\
側/下方進氣道與尾部噴嘴結構清晰；透明座艙罩；機身具備面板分件線與少量鉚釘等細節，\
整體風格寫實、軍用灰系塗裝，避免特定機型的可辨識特徵。";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from a .env file if it exists.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_timer(Uptime::default())
        .with_target(false)
        .init();

    let mut args = env::args().skip(1);
    let name = args.next().unwrap_or_else(|| DEFAULT_NAME.to_string());
    let description = args.next().unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string());
    let model = args
        .next()
        .unwrap_or_else(|| DEFAULT_LANGUAGE_MODEL.to_string());
    let out_dir = args.next();

    let client = ObjgenClient::new()?;

    let object = client.create(&name, &description, &model).await?;

    client
        .wait_until_final(&object.id, &object.version, &WaitOptions::default())
        .await?;
    tracing::info!("[3/5] verify version  version={}  status=succeeded", object.version);

    let content = client.fetch_content(&object.id, &object.version).await?;
    tracing::info!(
        "      content-type={}  glb_bytes={}",
        content.content_type.as_deref().unwrap_or("(none)"),
        content.bytes.len()
    );
    tracing::info!(
        "      snapshot={}",
        client.snapshot_url(&object.id, &object.version)?
    );

    if let Some(dir) = out_dir {
        let path = content.save(&object, &dir).await?;
        tracing::info!("      saved {}", path.display());
    }

    let content_url = client.content_url(&object.id, &object.version)?;
    client
        .register_debug(&DebugRoomRegistration::for_object(&object, content_url))
        .await?;

    Ok(())
}
