//! Starts a knock-knock exchange anchored on the command message.

use crate::application::conversation::KnockKnock;
use crate::domain::error::CommandError;
use crate::domain::types::{DispatchContext, Outcome};

pub async fn handle_knockknock(
    knock: &KnockKnock,
    ctx: &DispatchContext,
) -> Result<Outcome, CommandError> {
    let opener = knock.start(&ctx.room_id, &ctx.event_id, &ctx.label).await?;
    tracing::debug!("Knock-knock opener {} in {}", opener, ctx.room_id);
    Ok(Outcome::SentDirectly)
}
