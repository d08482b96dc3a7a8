//! Request dispatch from topic to store operation.
//!
//! # Responsibility
//! - Decode one request, run it against the versioned store and publish the
//!   reply on the action's reply topic.
//! - Publish `saved`/`deleted` events on success and `*_failed` events when a
//!   store call fails.
//!
//! # Invariants
//! - Exactly one reply is published per request with a known topic.
//! - Requests failing decode or header validation publish no event.

use crate::action::envelope::{
    require_header, DomainEvent, EventKind, GetRequest, IdRequest, Reply, ReplyStatus,
    RequestHeader, SaveRequest,
};
use crate::action::publisher::Publisher;
use crate::action::{Action, ActionError, TopicScheme, Verb};
use crate::clock::Clock;
use crate::model::attribute::{AttributeDefinition, ObjectTypeCustomization};
use crate::model::category::{Category, Hierarchy};
use crate::model::entity::{DomainObject, EntityKind, HasIdentity, ObjectId};
use crate::model::parameter::Parameter;
use crate::model::state::{State, StateTransitionRule};
use crate::model::validation::ValidationError;
use crate::store::document::DocumentStore;
use crate::store::versioned::VersionedStore;
use crate::store::{StoreError, StoreResult};
use log::{info, warn};
use serde::Serialize;
use serde_json::Value;
use std::time::Instant;

/// Handles action requests for every entity kind.
pub struct ActionHandler<S, C, P> {
    store: VersionedStore<S, C>,
    publisher: P,
    topics: TopicScheme,
}

impl<S, C, P> ActionHandler<S, C, P>
where
    S: DocumentStore,
    C: Clock,
    P: Publisher,
{
    pub fn new(store: VersionedStore<S, C>, publisher: P, topics: TopicScheme) -> Self {
        Self {
            store,
            publisher,
            topics,
        }
    }

    pub fn topics(&self) -> &TopicScheme {
        &self.topics
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Handles one request and publishes its reply.
    ///
    /// Returns the reply status. Only an unknown topic or an unencodable
    /// reply is returned as an error; every other failure becomes an error
    /// reply.
    pub fn handle(&self, topic: &str, payload: &str) -> Result<ReplyStatus, ActionError> {
        let action = self
            .topics
            .parse_request(topic)
            .ok_or_else(|| ActionError::UnknownTopic(topic.trim().to_string()))?;
        let started_at = Instant::now();

        let (request_id, result) = match action.kind {
            EntityKind::State => self.dispatch::<State>(action, payload),
            EntityKind::Category => self.dispatch::<Category>(action, payload),
            EntityKind::Hierarchy => self.dispatch::<Hierarchy>(action, payload),
            EntityKind::Parameter => self.dispatch::<Parameter>(action, payload),
            EntityKind::AttributeDefinition => {
                self.dispatch::<AttributeDefinition>(action, payload)
            }
            EntityKind::ObjectTypeCustomization => {
                self.dispatch::<ObjectTypeCustomization>(action, payload)
            }
            EntityKind::StateTransitionRule => {
                self.dispatch::<StateTransitionRule>(action, payload)
            }
        };

        let reply = match &result {
            Ok(objects) => Reply::ok(request_id.clone(), objects.clone()),
            Err(err) => Reply::error(request_id.clone(), err),
        };
        let body = serde_json::to_string(&reply).map_err(ActionError::ReplyEncoding)?;
        self.publisher
            .publish(&self.topics.reply_topic(action), body.as_str());

        let request_id = request_id.as_deref().unwrap_or("-");
        match result {
            Ok(objects) => info!(
                "event=action module=action status=ok collection={} verb={} request_id={} objects={} duration_ms={}",
                action.kind.collection_name(),
                action.verb.as_str(),
                request_id,
                objects.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event=action module=action status=error collection={} verb={} request_id={} duration_ms={} error_code={:?} error={}",
                action.kind.collection_name(),
                action.verb.as_str(),
                request_id,
                started_at.elapsed().as_millis(),
                err.code(),
                err
            ),
        }

        Ok(reply.header.status)
    }

    fn dispatch<T: DomainObject>(
        &self,
        action: Action,
        payload: &str,
    ) -> (Option<String>, Result<Vec<Value>, ActionError>) {
        let raw: Value = match serde_json::from_str(payload) {
            Ok(raw) => raw,
            Err(err) => return (None, Err(ActionError::BadRequest(err))),
        };
        let request_id = raw
            .pointer("/header/requestId")
            .and_then(Value::as_str)
            .map(str::to_string);

        let result = match action.verb {
            Verb::Save => self.save::<T>(raw),
            Verb::Delete => self.delete::<T>(raw),
            Verb::Get => self.get::<T>(raw),
            Verb::History => self.history::<T>(raw),
        };
        (request_id, result)
    }

    fn save<T: DomainObject>(&self, raw: Value) -> Result<Vec<Value>, ActionError> {
        let request: SaveRequest<T> = serde_json::from_value(raw).map_err(ActionError::BadRequest)?;
        let header = require_header(request.header.as_ref())?;
        let named_ids: Vec<ObjectId> = request
            .objects
            .iter()
            .filter_map(HasIdentity::persisted_id)
            .collect();

        match self
            .store
            .save_batch(request.objects, header.comment(), &header.user)
        {
            Ok(saved) => {
                let ids = saved.iter().filter_map(HasIdentity::persisted_id).collect();
                self.publish_event(T::KIND, EventKind::Saved, ids, header, None);
                Ok(to_values(&saved)?)
            }
            Err(err) => {
                let err = ActionError::from(err);
                self.publish_event(T::KIND, EventKind::SaveFailed, named_ids, header, Some(&err));
                Err(err)
            }
        }
    }

    fn delete<T: DomainObject>(&self, raw: Value) -> Result<Vec<Value>, ActionError> {
        let request: IdRequest = serde_json::from_value(raw).map_err(ActionError::BadRequest)?;
        let header = require_header(request.header.as_ref())?;
        let id = request.require_id()?;

        match self.store.delete_by_id_with_comment(
            id,
            T::KIND.collection_name(),
            header.comment(),
            &header.user,
        ) {
            Ok(()) => {
                self.publish_event(T::KIND, EventKind::Deleted, vec![id], header, None);
                Ok(Vec::new())
            }
            Err(err) => {
                let err = ActionError::from(err);
                self.publish_event(T::KIND, EventKind::DeleteFailed, vec![id], header, Some(&err));
                Err(err)
            }
        }
    }

    fn get<T: DomainObject>(&self, raw: Value) -> Result<Vec<Value>, ActionError> {
        let request: GetRequest = serde_json::from_value(raw).map_err(ActionError::BadRequest)?;
        require_header(request.header.as_ref())?;

        let objects: Vec<T> = match (request.id, request.filter) {
            (Some(_), Some(_)) => return Err(ValidationError::ConflictingSelectors.into()),
            (Some(id), None) => {
                let object = self
                    .store
                    .get_by_id::<T>(id)?
                    .ok_or(StoreError::NoDataFound {
                        collection: T::KIND.collection_name(),
                        id,
                    })?;
                vec![object]
            }
            (None, Some(filter)) => self
                .store
                .find_by_field::<T>(filter.field.trim(), &filter.value)?,
            (None, None) => self.store.list::<T>()?,
        };
        Ok(to_values(&objects)?)
    }

    fn history<T: DomainObject>(&self, raw: Value) -> Result<Vec<Value>, ActionError> {
        let request: IdRequest = serde_json::from_value(raw).map_err(ActionError::BadRequest)?;
        require_header(request.header.as_ref())?;
        let id = request.require_id()?;

        let records = self.store.history::<T>(id)?;
        Ok(to_values(&records)?)
    }

    fn publish_event(
        &self,
        kind: EntityKind,
        event: EventKind,
        ids: Vec<ObjectId>,
        header: &RequestHeader,
        error: Option<&ActionError>,
    ) {
        let event = DomainEvent {
            event,
            collection: kind.collection_name().to_string(),
            ids,
            user: header.user.trim().to_string(),
            request_id: header.request_id.clone(),
            at: self.store.clock().now_ms(),
            error: error.map(ActionError::code),
        };

        match serde_json::to_string(&event) {
            Ok(payload) => self
                .publisher
                .publish(&self.topics.event_topic(kind), payload.as_str()),
            Err(err) => warn!(
                "event=publish_event module=action status=error collection={} error={}",
                kind.collection_name(),
                err
            ),
        }
    }
}

fn to_values<T: Serialize>(objects: &[T]) -> StoreResult<Vec<Value>> {
    objects
        .iter()
        .map(|object| serde_json::to_value(object).map_err(StoreError::from))
        .collect()
}
