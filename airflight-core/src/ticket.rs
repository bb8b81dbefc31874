use rand::Rng;

use crate::repository::{ReservationTx, StoreResult};

pub const TICKET_NO_LEN: usize = 13;
const TICKET_NO_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Attempts before giving up on finding an unused ticket number
pub const TICKET_NO_ATTEMPTS: usize = 5;

pub fn random_ticket_no<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..TICKET_NO_LEN)
        .map(|_| TICKET_NO_CHARSET[rng.gen_range(0..TICKET_NO_CHARSET.len())] as char)
        .collect()
}

/// Draws ticket numbers from `draw` until one is unused in `tx` and not in `reserved`.
///
/// `reserved` holds numbers already handed out earlier in the same transaction.
/// Returns `None` once [`TICKET_NO_ATTEMPTS`] draws have all collided.
pub async fn allocate_ticket_no<F>(
    tx: &mut dyn ReservationTx,
    reserved: &[String],
    mut draw: F,
) -> StoreResult<Option<String>>
where
    F: FnMut() -> String + Send,
{
    for _ in 0..TICKET_NO_ATTEMPTS {
        let candidate = draw();
        if reserved.contains(&candidate) || tx.ticket_exists(&candidate).await? {
            tracing::warn!("Ticket number collision on {}, drawing again", candidate);
            continue;
        }
        return Ok(Some(candidate));
    }
    Ok(None)
}
