use misc_core::{
    open_db_in_memory, ActionError, ActionHandler, DomainEvent, ErrorCode, EventKind,
    ManualClock, RecordingPublisher, Reply, ReplyStatus, SqliteDocumentStore, TopicScheme,
    VersionedStore,
};
use rusqlite::Connection;
use serde_json::{json, Value};

type Handler<'a> = ActionHandler<SqliteDocumentStore<'a>, ManualClock, RecordingPublisher>;

fn handler(conn: &Connection) -> Handler<'_> {
    ActionHandler::new(
        VersionedStore::with_clock(
            SqliteDocumentStore::try_new(conn).unwrap(),
            ManualClock::new(1_700_000_000_000),
        ),
        RecordingPublisher::new(),
        TopicScheme::default(),
    )
}

fn last_reply(handler: &Handler<'_>, topic: &str) -> Reply {
    let messages = handler.publisher().on_topic(topic);
    let message = messages.last().expect("a reply should be published");
    serde_json::from_str(&message.payload).unwrap()
}

fn events(handler: &Handler<'_>, topic: &str) -> Vec<DomainEvent> {
    handler
        .publisher()
        .on_topic(topic)
        .iter()
        .map(|message| serde_json::from_str(&message.payload).unwrap())
        .collect()
}

fn header(request_id: &str) -> Value {
    json!({"requestId": request_id, "user": "alice", "comment": "via test"})
}

#[test]
fn save_get_delete_history_flow() {
    let conn = open_db_in_memory().unwrap();
    let handler = handler(&conn);

    let status = handler
        .handle(
            "misc/categories/save/request",
            &json!({"header": header("r1"), "objects": [{"name": "Alpha"}]}).to_string(),
        )
        .unwrap();
    assert_eq!(status, ReplyStatus::Ok);

    let reply = last_reply(&handler, "misc/categories/save/reply");
    assert_eq!(reply.header.request_id.as_deref(), Some("r1"));
    assert_eq!(reply.objects.len(), 1);
    let id = reply.objects[0]["id"].as_str().unwrap().to_string();
    assert_eq!(reply.objects[0]["createdAt"], json!(1_700_000_000_000_i64));

    let saved = events(&handler, "misc/categories/events");
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].event, EventKind::Saved);
    assert_eq!(saved[0].ids[0].to_string(), id);
    assert_eq!(saved[0].user, "alice");
    assert_eq!(saved[0].request_id.as_deref(), Some("r1"));

    handler
        .handle(
            "misc/categories/save/request",
            &json!({"header": header("r2"), "objects": [{"id": id, "name": "Beta"}]}).to_string(),
        )
        .unwrap();

    handler
        .handle(
            "misc/categories/get/request",
            &json!({"header": header("r3"), "id": id}).to_string(),
        )
        .unwrap();
    let reply = last_reply(&handler, "misc/categories/get/reply");
    assert_eq!(reply.objects[0]["name"], "Beta");
    assert_eq!(reply.objects[0]["changeUser"], "alice");
    assert_eq!(reply.objects[0]["changeComment"], "via test");

    let status = handler
        .handle(
            "misc/categories/delete/request",
            &json!({"header": header("r4"), "id": id}).to_string(),
        )
        .unwrap();
    assert_eq!(status, ReplyStatus::Ok);
    assert!(last_reply(&handler, "misc/categories/delete/reply")
        .objects
        .is_empty());

    handler
        .handle(
            "misc/categories/history/request",
            &json!({"header": header("r5"), "id": id}).to_string(),
        )
        .unwrap();
    let reply = last_reply(&handler, "misc/categories/history/reply");
    assert_eq!(reply.objects.len(), 2);
    assert_eq!(reply.objects[0]["object"]["name"], "Alpha");
    assert_eq!(reply.objects[1]["object"]["name"], "Beta");
    assert!(reply.objects[1]["object"]["deletedAt"].is_i64());

    let kinds: Vec<EventKind> = events(&handler, "misc/categories/events")
        .into_iter()
        .map(|event| event.event)
        .collect();
    assert_eq!(kinds, [EventKind::Saved, EventKind::Saved, EventKind::Deleted]);
}

#[test]
fn get_supports_filter_and_list() {
    let conn = open_db_in_memory().unwrap();
    let handler = handler(&conn);
    handler
        .handle(
            "misc/states/save/request",
            &json!({
                "header": header("seed"),
                "objects": [
                    {"name": "Open", "objectType": "ticket", "initial": true},
                    {"name": "Closed", "objectType": "ticket", "terminal": true},
                    {"name": "Draft", "objectType": "document"}
                ]
            })
            .to_string(),
        )
        .unwrap();

    handler
        .handle(
            "misc/states/get/request",
            &json!({"header": header("f"), "filter": {"field": "objectType", "value": "ticket"}})
                .to_string(),
        )
        .unwrap();
    let filtered = last_reply(&handler, "misc/states/get/reply");
    assert_eq!(filtered.objects.len(), 2);

    handler
        .handle(
            "misc/states/get/request",
            &json!({"header": header("all")}).to_string(),
        )
        .unwrap();
    let all = last_reply(&handler, "misc/states/get/reply");
    assert_eq!(all.objects.len(), 3);
    assert_eq!(all.objects[2]["name"], "Draft");
}

#[test]
fn get_with_both_id_and_filter_is_rejected_as_conflicting() {
    let conn = open_db_in_memory().unwrap();
    let handler = handler(&conn);

    let status = handler
        .handle(
            "misc/states/get/request",
            &json!({
                "header": header("both"),
                "id": uuid::Uuid::new_v4(),
                "filter": {"field": "objectType", "value": "ticket"}
            })
            .to_string(),
        )
        .unwrap();
    assert_eq!(status, ReplyStatus::Error);

    let error = last_reply(&handler, "misc/states/get/reply")
        .header
        .error
        .unwrap();
    assert_eq!(error.code, ErrorCode::ValidationError);
    assert_eq!(error.message, "use either id or filter, not both");
    assert!(!error.message.contains("header"));
}

#[test]
fn replace_of_unknown_identity_replies_no_data_found_and_emits_failure_event() {
    let conn = open_db_in_memory().unwrap();
    let handler = handler(&conn);
    let ghost = uuid::Uuid::new_v4();

    let status = handler
        .handle(
            "misc/parameters/save/request",
            &json!({
                "header": header("r1"),
                "objects": [{"name": "a", "value": "1"}, {"id": ghost, "name": "b", "value": "2"}]
            })
            .to_string(),
        )
        .unwrap();
    assert_eq!(status, ReplyStatus::Error);

    let reply = last_reply(&handler, "misc/parameters/save/reply");
    assert_eq!(reply.header.error.unwrap().code, ErrorCode::NoDataFound);
    assert!(reply.objects.is_empty());

    let failed = events(&handler, "misc/parameters/events");
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].event, EventKind::SaveFailed);
    assert_eq!(failed[0].ids, [ghost]);
    assert_eq!(failed[0].error, Some(ErrorCode::NoDataFound));

    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM documents;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 0);
}

#[test]
fn delete_of_unknown_identity_replies_no_data_found() {
    let conn = open_db_in_memory().unwrap();
    let handler = handler(&conn);
    let ghost = uuid::Uuid::new_v4();

    handler
        .handle(
            "misc/hierarchies/delete/request",
            &json!({"header": header("d1"), "id": ghost}).to_string(),
        )
        .unwrap();

    let reply = last_reply(&handler, "misc/hierarchies/delete/reply");
    assert_eq!(reply.header.status, ReplyStatus::Error);
    assert_eq!(reply.header.error.unwrap().code, ErrorCode::NoDataFound);

    let failed = events(&handler, "misc/hierarchies/events");
    assert_eq!(failed[0].event, EventKind::DeleteFailed);
    assert_eq!(failed[0].ids, [ghost]);
}

#[test]
fn missing_header_is_rejected_without_store_call_or_event() {
    let conn = open_db_in_memory().unwrap();
    let handler = handler(&conn);

    let status = handler
        .handle(
            "misc/categories/save/request",
            &json!({"objects": [{"name": "Alpha"}]}).to_string(),
        )
        .unwrap();
    assert_eq!(status, ReplyStatus::Error);
    let reply = last_reply(&handler, "misc/categories/save/reply");
    assert_eq!(reply.header.error.unwrap().code, ErrorCode::ValidationError);

    handler
        .handle(
            "misc/categories/save/request",
            &json!({"header": {"user": "  "}, "objects": [{"name": "Alpha"}]}).to_string(),
        )
        .unwrap();
    let reply = last_reply(&handler, "misc/categories/save/reply");
    assert_eq!(reply.header.error.unwrap().code, ErrorCode::ValidationError);

    assert!(handler
        .publisher()
        .on_topic("misc/categories/events")
        .is_empty());
    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM documents;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 0);
}

#[test]
fn entity_validation_failure_replies_validation_error() {
    let conn = open_db_in_memory().unwrap();
    let handler = handler(&conn);

    handler
        .handle(
            "misc/attribute_definitions/save/request",
            &json!({
                "header": header("v1"),
                "objects": [{"name": "color", "objectType": "car", "dataType": "enumeration"}]
            })
            .to_string(),
        )
        .unwrap();
    let reply = last_reply(&handler, "misc/attribute_definitions/save/reply");
    assert_eq!(reply.header.error.unwrap().code, ErrorCode::ValidationError);

    let failed = events(&handler, "misc/attribute_definitions/events");
    assert_eq!(failed[0].event, EventKind::SaveFailed);
    assert!(failed[0].ids.is_empty());
}

#[test]
fn malformed_payload_replies_bad_request() {
    let conn = open_db_in_memory().unwrap();
    let handler = handler(&conn);

    let status = handler
        .handle("misc/states/save/request", "{not json")
        .unwrap();
    assert_eq!(status, ReplyStatus::Error);
    let reply = last_reply(&handler, "misc/states/save/reply");
    assert_eq!(reply.header.request_id, None);
    assert_eq!(reply.header.error.unwrap().code, ErrorCode::BadRequest);

    handler
        .handle(
            "misc/states/save/request",
            &json!({"header": header("b2"), "objects": "nope"}).to_string(),
        )
        .unwrap();
    let reply = last_reply(&handler, "misc/states/save/reply");
    assert_eq!(reply.header.request_id.as_deref(), Some("b2"));
    assert_eq!(reply.header.error.unwrap().code, ErrorCode::BadRequest);
}

#[test]
fn missing_id_on_delete_and_history_is_a_validation_error() {
    let conn = open_db_in_memory().unwrap();
    let handler = handler(&conn);

    for verb in ["delete", "history"] {
        handler
            .handle(
                &format!("misc/states/{verb}/request"),
                &json!({"header": header(verb), "id": ""}).to_string(),
            )
            .unwrap();
        let reply = last_reply(&handler, &format!("misc/states/{verb}/reply"));
        assert_eq!(
            reply.header.error.unwrap().code,
            ErrorCode::ValidationError,
            "{verb}"
        );
    }
    assert!(handler.publisher().on_topic("misc/states/events").is_empty());
}

#[test]
fn unknown_topic_is_an_error_without_reply() {
    let conn = open_db_in_memory().unwrap();
    let handler = handler(&conn);

    let err = handler
        .handle("misc/widgets/save/request", "{}")
        .unwrap_err();
    assert!(matches!(err, ActionError::UnknownTopic(_)));
    assert!(handler.publisher().messages().is_empty());
}
