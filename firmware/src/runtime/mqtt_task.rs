use embassy_net::Stack;

use super::{CONFIG, EVENTS, SESSION, STATUS_OUTBOX};
use crate::mqtt::session;

#[embassy_executor::task]
pub async fn run(stack: Stack<'static>) -> ! {
    session::run(
        stack,
        &CONFIG,
        STATUS_OUTBOX.receiver(),
        EVENTS.sender(),
        &SESSION,
    )
    .await
}
