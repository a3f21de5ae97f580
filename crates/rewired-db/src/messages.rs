use rusqlite::{params, OptionalExtension, Row};

use rewired_types::api::{MessageBox, SendMessageRequest};
use rewired_types::models::Message;

use crate::{Database, Result, StoreError};

const MESSAGE_SELECT: &str = "SELECT m.id, m.sender_id, m.receiver_id, m.product_id, m.subject, m.body,
        m.is_read, m.created_at, u1.username, u2.username, p.title
 FROM messages m
 JOIN users u1 ON m.sender_id = u1.id
 JOIN users u2 ON m.receiver_id = u2.id
 LEFT JOIN products p ON m.product_id = p.id";

fn map_message(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        receiver_id: row.get(2)?,
        product_id: row.get(3)?,
        subject: row.get(4)?,
        body: row.get(5)?,
        is_read: row.get(6)?,
        created_at: row.get(7)?,
        sender_name: row.get(8)?,
        receiver_name: row.get(9)?,
        product_title: row.get(10)?,
    })
}

impl Database {
    pub fn send_message(&self, sender_id: i64, req: &SendMessageRequest) -> Result<Message> {
        if sender_id == req.receiver_id {
            return Err(StoreError::invalid("You cannot send messages to yourself"));
        }

        self.with_conn(|conn| {
            let receiver: Option<i64> = conn
                .query_row(
                    "SELECT id FROM users WHERE id = ?1",
                    [req.receiver_id],
                    |row| row.get(0),
                )
                .optional()?;
            if receiver.is_none() {
                return Err(StoreError::not_found("Receiver not found"));
            }

            conn.execute(
                "INSERT INTO messages (sender_id, receiver_id, product_id, subject, body)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    sender_id,
                    req.receiver_id,
                    req.product_id,
                    req.subject,
                    req.body,
                ],
            )?;

            let id = conn.last_insert_rowid();
            let sql = format!("{} WHERE m.id = ?1", MESSAGE_SELECT);
            Ok(conn.query_row(&sql, [id], map_message)?)
        })
    }

    /// Inbox or sent view, newest first.
    pub fn list_messages(&self, user_id: i64, kind: MessageBox) -> Result<Vec<Message>> {
        let column = match kind {
            MessageBox::Inbox => "m.receiver_id",
            MessageBox::Sent => "m.sender_id",
        };
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE {} = ?1 ORDER BY m.created_at DESC",
                MESSAGE_SELECT, column
            );
            let mut stmt = conn.prepare(&sql)?;
            let messages = stmt
                .query_map([user_id], map_message)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(messages)
        })
    }

    /// Only the receiver may flip the read flag.
    pub fn mark_message_read(&self, id: i64, user_id: i64) -> Result<()> {
        self.with_conn(|conn| {
            let receiver: Option<i64> = conn
                .query_row(
                    "SELECT receiver_id FROM messages WHERE id = ?1",
                    [id],
                    |row| row.get(0),
                )
                .optional()?;

            let receiver = receiver.ok_or_else(|| StoreError::not_found("Message not found"))?;
            if receiver != user_id {
                return Err(StoreError::forbidden(
                    "Only the receiver can mark a message as read",
                ));
            }

            conn.execute("UPDATE messages SET is_read = 1 WHERE id = ?1", [id])?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{list_product, register};

    #[test]
    fn self_messaging_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let alice = register(&db, "alice", "alice@example.com");

        let err = db
            .send_message(
                alice,
                &SendMessageRequest {
                    receiver_id: alice,
                    product_id: None,
                    subject: None,
                    body: "hi me".into(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
    }

    #[test]
    fn inbox_and_sent_are_split() {
        let db = Database::open_in_memory().unwrap();
        let alice = register(&db, "alice", "alice@example.com");
        let bob = register(&db, "bob", "bob@example.com");
        let product_id = list_product(&db, bob, 10.0, 1);

        db.send_message(
            alice,
            &SendMessageRequest {
                receiver_id: bob,
                product_id: Some(product_id),
                subject: Some("Is this available?".into()),
                body: "Interested in the handset.".into(),
            },
        )
        .unwrap();

        let inbox = db.list_messages(bob, MessageBox::Inbox).unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].sender_name, "alice");
        assert_eq!(inbox[0].product_title.as_deref(), Some("Refurbished handset"));
        assert!(!inbox[0].is_read);

        assert!(db.list_messages(alice, MessageBox::Inbox).unwrap().is_empty());
        assert_eq!(db.list_messages(alice, MessageBox::Sent).unwrap().len(), 1);
    }

    #[test]
    fn only_receiver_marks_read() {
        let db = Database::open_in_memory().unwrap();
        let alice = register(&db, "alice", "alice@example.com");
        let bob = register(&db, "bob", "bob@example.com");

        let msg = db
            .send_message(
                alice,
                &SendMessageRequest {
                    receiver_id: bob,
                    product_id: None,
                    subject: None,
                    body: "ping".into(),
                },
            )
            .unwrap();

        let err = db.mark_message_read(msg.id, alice).unwrap_err();
        assert!(matches!(err, StoreError::Forbidden(_)));

        db.mark_message_read(msg.id, bob).unwrap();
        let inbox = db.list_messages(bob, MessageBox::Inbox).unwrap();
        assert!(inbox[0].is_read);
    }

    #[test]
    fn unknown_receiver_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let alice = register(&db, "alice", "alice@example.com");

        let err = db
            .send_message(
                alice,
                &SendMessageRequest {
                    receiver_id: 9999,
                    product_id: None,
                    subject: None,
                    body: "hello?".into(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
