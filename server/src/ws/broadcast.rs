use super::protocol::ServerEvent;
use super::ConnectionRegistry;

/// Broadcast an event to every connected client (the public channel).
/// Returns the number of connections the event was queued on.
pub fn broadcast_to_all(registry: &ConnectionRegistry, event: &ServerEvent) -> usize {
    let Some(msg) = event.to_message() else {
        return 0;
    };

    registry
        .all_senders()
        .iter()
        .filter(|sender| sender.send(msg.clone()).is_ok())
        .count()
}

/// Send an event to a specific user (all their connections, the private channel).
/// Returns the number of connections the event was queued on.
pub fn send_to_user(registry: &ConnectionRegistry, user_id: &str, event: &ServerEvent) -> usize {
    let Some(msg) = event.to_message() else {
        return 0;
    };

    registry
        .senders_for(user_id)
        .iter()
        .filter(|sender| sender.send(msg.clone()).is_ok())
        .count()
}
