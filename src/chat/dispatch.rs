// 🚦 Entry Dispatcher - webhook entries → records → reply
//
// Per inbound message: resolve the sender's account, load its reference
// data, let the first matching extractor claim the text, persist, reply.
// Failures are logged and the next message is processed regardless.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::account::{find_account_by_phone_number, Team};
use crate::area::{AreaParser, AreaResolver};
use crate::breed::BreedMatcher;
use crate::db;
use crate::textmsg::MessageSender;

use super::envelope::{Entry, InboundMessage};
use super::{classify, BaseContext, References};

/// What happened to one inbound message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// Records written; `sent` is false when the reply could not be delivered
    Recorded {
        collection: &'static str,
        reply: String,
        sent: bool,
    },
    /// An extractor claimed the message but writing failed; no reply sent
    PersistFailed { collection: &'static str },
    /// No extractor recognized the text (ordinary conversation)
    Ignored,
}

/// Process every message of every change in the delivered entries
pub fn process_entries(conn: &Connection, sender: &dyn MessageSender, entries: &[Entry]) -> Vec<DispatchOutcome> {
    entries
        .iter()
        .flat_map(|entry| process_entry(conn, sender, entry))
        .collect()
}

pub fn process_entry(conn: &Connection, sender: &dyn MessageSender, entry: &Entry) -> Vec<DispatchOutcome> {
    let mut outcomes = Vec::new();

    for change in &entry.changes {
        let contact_name = change
            .value
            .contacts
            .last()
            .map(|c| c.profile.name.as_str())
            .unwrap_or("unknown");

        for message in &change.value.messages {
            outcomes.push(process_message(conn, sender, contact_name, message));
        }
    }

    outcomes
}

/// Message time from epoch seconds, or now when unreadable
fn message_time(timestamp: &str) -> DateTime<Utc> {
    timestamp
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .unwrap_or_else(|| {
            debug!(timestamp, "unreadable message timestamp, using current time");
            Utc::now()
        })
}

fn resolve_team(conn: &Connection, from: &str) -> Team {
    match find_account_by_phone_number(conn, from) {
        Ok(team) => team,
        Err(e) => {
            warn!(phone = from, "Could not find account: {:#}", e);
            Team::default()
        }
    }
}

fn process_message(
    conn: &Connection,
    sender: &dyn MessageSender,
    contact_name: &str,
    message: &InboundMessage,
) -> DispatchOutcome {
    let time = message_time(&message.timestamp);
    let team = resolve_team(conn, &message.from);

    let name = if team.name.is_empty() { contact_name } else { team.name.as_str() };
    let phone_number = if team.phone_number.is_empty() {
        message.from.as_str()
    } else {
        team.phone_number.as_str()
    };

    // Reference data is reloaded for every message
    let breeds = BreedMatcher::load(conn, &team.account).unwrap_or_else(|e| {
        warn!(account = %team.account, "Could not load breeds: {:#}", e);
        BreedMatcher::new()
    });
    let mut areas = AreaParser::new(conn);
    if let Err(e) = areas.load_by_account(&team.account) {
        warn!(account = %team.account, "Could not load areas: {:#}", e);
    }

    let ctx = BaseContext {
        account: team.account.clone(),
        phone_number: phone_number.to_string(),
        name: name.to_string(),
        date: time.to_rfc3339_opts(SecondsFormat::Secs, true),
    };

    let refs = References {
        breeds: &breeds,
        areas: Some(&areas as &dyn AreaResolver),
    };

    let Some((kind, parser)) = classify(&message.text.body, refs) else {
        debug!(phone = %ctx.phone_number, "message not recognized, ignoring");
        return DispatchOutcome::Ignored;
    };

    let collection = kind.collection();
    info!(collection, account = %ctx.account, phone = %ctx.phone_number, "message parsed");

    if let Err(e) = parser.persist(conn, &ctx) {
        error!(collection, account = %ctx.account, "Error inserting records: {:#}", e);
        return DispatchOutcome::PersistFailed { collection };
    }

    if let Err(e) = db::insert_parsed_message(conn, &ctx, message.text.body.trim(), collection) {
        warn!(collection, "Could not save parsed message: {:#}", e);
    }

    let reply = parser.reply(&team.language);
    let sent = match sender.send(&ctx.phone_number, &reply) {
        Ok(()) => true,
        Err(e) => {
            warn!(to = %ctx.phone_number, "Error during text reply: {}", e);
            false
        }
    };

    DispatchOutcome::Recorded { collection, reply, sent }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::envelope::{Change, ChangeValue, Contact, Profile, Text};
    use crate::textmsg::{RecordingSender, SendError};

    struct FailingSender;

    impl MessageSender for FailingSender {
        fn send(&self, _to: &str, _body: &str) -> Result<(), SendError> {
            Err(SendError::Rejected {
                status: 401,
                body: "invalid token".to_string(),
            })
        }
    }

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        db::setup_database(&conn).unwrap();
        db::insert_breed(&conn, db::GLOBAL_ACCOUNT, "cruzado", "cruzado, cruz").unwrap();
        db::insert_breed(&conn, "acc1", "nelore", "nelore, nel").unwrap();
        db::insert_area(&conn, "acc1", "espirito santo", "Espírito Santo", "").unwrap();
        db::insert_team(
            &conn,
            &Team {
                account: "acc1".to_string(),
                phone_number: "55-12-12345-1234".to_string(),
                name: "Fazenda Boa Vista".to_string(),
                language: "en-US".to_string(),
            },
        )
        .unwrap();
        conn
    }

    fn entry(from: &str, body: &str, timestamp: &str) -> Entry {
        Entry {
            id: "1".to_string(),
            changes: vec![Change {
                field: "messages".to_string(),
                value: ChangeValue {
                    contacts: vec![Contact {
                        profile: Profile {
                            name: "João".to_string(),
                        },
                        wa_id: from.to_string(),
                    }],
                    messages: vec![InboundMessage {
                        id: "wamid.1".to_string(),
                        from: from.to_string(),
                        timestamp: timestamp.to_string(),
                        kind: "text".to_string(),
                        text: Text {
                            body: body.to_string(),
                        },
                    }],
                    ..Default::default()
                },
            }],
        }
    }

    #[test]
    fn test_birth_message_end_to_end() {
        let conn = setup();
        let sender = RecordingSender::default();

        let outcomes = process_entries(
            &conn,
            &sender,
            &[entry("5512123451234", "  88888 m cruz\nbez 12 f nel\nEspirito Santo  ", "1710500000")],
        );

        assert_eq!(
            outcomes,
            vec![DispatchOutcome::Recorded {
                collection: "birth",
                reply: "Zap Manejo has detected birth data. We added 2 births to area espirito santo.".to_string(),
                sent: true,
            }]
        );

        let births = db::get_births(&conn, "acc1").unwrap();
        assert_eq!(births.len(), 2);
        assert_eq!(births[0].breed, "cruzado");
        assert_eq!(births[1].breed, "nelore");
        assert_eq!(births[0].name, "Fazenda Boa Vista");
        assert_eq!(births[0].phone, "55-12-12345-1234");
        assert_eq!(births[0].date, "2024-03-15T10:53:20Z");

        assert_eq!(sender.sent()[0].0, "55-12-12345-1234");
        assert_eq!(db::count_rows(&conn, "messages").unwrap(), 1);
    }

    #[test]
    fn test_death_wins_over_birth() {
        let conn = setup();
        let sender = RecordingSender::default();

        process_entries(&conn, &sender, &[entry("5512123451234", "2235 m cruzado", "1710500000")]);
        let outcomes = process_entries(
            &conn,
            &sender,
            &[entry("5512123451234", "2235 morreu\n88888 m cruzado", "1710500000")],
        );

        assert!(matches!(
            outcomes.as_slice(),
            [DispatchOutcome::Recorded { collection: "death", .. }]
        ));

        let births = db::get_births(&conn, "acc1").unwrap();
        assert_eq!(births.len(), 1, "birth line in a death message must not be recorded");
        assert_eq!(births[0].cause.as_deref(), Some("morreu"));
    }

    #[test]
    fn test_conversation_is_ignored_silently() {
        let conn = setup();
        let sender = RecordingSender::default();

        let outcomes = process_entries(&conn, &sender, &[entry("5512123451234", "Bom dia, tudo certo?", "1710500000")]);

        assert_eq!(outcomes, vec![DispatchOutcome::Ignored]);
        assert!(sender.sent().is_empty());
        assert_eq!(db::count_rows(&conn, "messages").unwrap(), 0);
    }

    #[test]
    fn test_unknown_sender_is_processed_best_effort() {
        let conn = setup();
        let sender = RecordingSender::default();

        let outcomes = process_entries(&conn, &sender, &[entry("16166100305", "15/3 20 mm", "bad-timestamp")]);

        match outcomes.as_slice() {
            [DispatchOutcome::Recorded { collection, reply, sent }] => {
                assert_eq!(*collection, "rain");
                assert!(reply.starts_with("Zap Manejo detectou dados de precipitação"));
                assert!(sent);
            }
            other => panic!("unexpected outcomes {:?}", other),
        }

        let rain = db::get_rain(&conn, "").unwrap();
        assert_eq!(rain.len(), 1);
        assert_eq!(rain[0].phone, "16166100305");
        assert_eq!(rain[0].name, "João");
        assert_eq!(sender.sent()[0].0, "16166100305");
    }

    #[test]
    fn test_account_breeds_do_not_leak() {
        let conn = setup();
        let sender = RecordingSender::default();

        // "nel" is only configured for acc1
        let outcomes = process_entries(&conn, &sender, &[entry("16166100305", "5 m nel", "1710500000")]);
        assert_eq!(outcomes, vec![DispatchOutcome::Ignored]);
    }

    #[test]
    fn test_send_failure_is_reported_not_fatal() {
        let conn = setup();

        let outcomes = process_entries(&conn, &FailingSender, &[entry("5512123451234", "15/3 31c", "1710500000")]);

        assert!(matches!(
            outcomes.as_slice(),
            [DispatchOutcome::Recorded { collection: "temperature", sent: false, .. }]
        ));
        assert_eq!(db::get_temperatures(&conn, "acc1").unwrap().len(), 1);
    }

    #[test]
    fn test_persist_failure_skips_reply() {
        let conn = setup();
        let sender = RecordingSender::default();
        conn.execute_batch("DROP TABLE weather").unwrap();

        let outcomes = process_entries(&conn, &sender, &[entry("5512123451234", "15/3 sol", "1710500000")]);

        assert_eq!(outcomes, vec![DispatchOutcome::PersistFailed { collection: "weather" }]);
        assert!(sender.sent().is_empty());
    }

    #[test]
    fn test_new_area_registered_for_account() {
        let conn = setup();
        let sender = RecordingSender::default();

        process_entries(&conn, &sender, &[entry("5512123451234", "1 f nelore\nJupiter", "1710500000")]);

        let areas = db::load_areas(&conn, "acc1").unwrap();
        assert!(areas.iter().any(|a| a.name == "jupiter"));
        assert!(sender.sent()[0].1.ends_with("area jupiter."));
    }

    #[test]
    fn test_message_time() {
        assert_eq!(message_time("0").timestamp(), 0);
        assert_eq!(message_time(" 1710500000 ").timestamp(), 1710500000);
        assert!((Utc::now() - message_time("yesterday")).num_seconds() < 5);
    }
}
