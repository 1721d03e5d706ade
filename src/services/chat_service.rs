use std::{fmt, str::FromStr};

use uuid::Uuid;

use crate::{
    dto::{
        chat::{ChatHistory, PostMessageRequest},
        notifications::MarkedRead,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{ChatMessage, NotificationKind, Role},
    realtime::{HubEvent, Subscription, topics},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    services::notification_service::notify_quietly,
    state::AppState,
};

/// A conversation with customer service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatThread {
    /// `support:{user_id}`: a customer and support staff.
    Support(Uuid),
    /// `supplier:{supplier_id}`: a supplier and support staff.
    Supplier(Uuid),
}

impl ChatThread {
    pub fn owner(&self) -> Uuid {
        match self {
            ChatThread::Support(id) | ChatThread::Supplier(id) => *id,
        }
    }

    pub fn ensure_access(&self, user: &AuthUser) -> AppResult<()> {
        let allowed = match (self, user.role) {
            (_, Role::Admin) => true,
            (ChatThread::Supplier(id), Role::Supplier) => *id == user.user_id,
            (ChatThread::Support(id), _) => *id == user.user_id,
            (ChatThread::Supplier(_), _) => false,
        };
        if allowed { Ok(()) } else { Err(AppError::Forbidden) }
    }
}

impl fmt::Display for ChatThread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatThread::Support(id) => write!(f, "support:{id}"),
            ChatThread::Supplier(id) => write!(f, "supplier:{id}"),
        }
    }
}

impl FromStr for ChatThread {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AppError::BadRequest(format!("unknown chat thread '{s}'"));
        let (kind, id) = s.split_once(':').ok_or_else(invalid)?;
        let id = Uuid::parse_str(id).map_err(|_| invalid())?;
        match kind {
            "support" => Ok(ChatThread::Support(id)),
            "supplier" => Ok(ChatThread::Supplier(id)),
            _ => Err(invalid()),
        }
    }
}

pub async fn post_message(
    state: &AppState,
    user: &AuthUser,
    thread: ChatThread,
    payload: PostMessageRequest,
) -> AppResult<ApiResponse<ChatMessage>> {
    thread.ensure_access(user)?;
    let body = payload.body.trim();
    if body.is_empty() && payload.attachment_url.is_none() {
        return Err(AppError::BadRequest(
            "message needs a body or an attachment".into(),
        ));
    }

    let message = sqlx::query_as::<_, ChatMessage>(
        r#"
        INSERT INTO chat_messages (id, thread, sender_id, body, attachment_url)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(thread.to_string())
    .bind(user.user_id)
    .bind(body)
    .bind(payload.attachment_url)
    .fetch_one(&state.pool)
    .await?;

    let key = thread.to_string();
    state
        .hub
        .publish(&topics::chat(&key), HubEvent::new("message", &message));

    if thread.owner() != user.user_id {
        notify_quietly(
            state,
            thread.owner(),
            NotificationKind::Chat,
            "New message from support",
            &message.body,
        )
        .await;
    }

    Ok(ApiResponse::success("Sent", message, None))
}

pub async fn list_messages(
    state: &AppState,
    user: &AuthUser,
    thread: ChatThread,
    pagination: Pagination,
) -> AppResult<ApiResponse<ChatHistory>> {
    thread.ensure_access(user)?;
    let (page, limit, offset) = pagination.normalize();
    let key = thread.to_string();

    let items = sqlx::query_as::<_, ChatMessage>(
        r#"
        SELECT * FROM chat_messages
        WHERE thread = $1
        ORDER BY created_at ASC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(&key)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chat_messages WHERE thread = $1")
        .bind(&key)
        .fetch_one(&state.pool)
        .await?;

    Ok(ApiResponse::success(
        "OK",
        ChatHistory { thread: key, items },
        Some(Meta::new(page, limit, total.0)),
    ))
}

/// Marks everything the other side sent in the thread as read.
pub async fn mark_thread_read(
    state: &AppState,
    user: &AuthUser,
    thread: ChatThread,
) -> AppResult<ApiResponse<MarkedRead>> {
    thread.ensure_access(user)?;
    let result = sqlx::query(
        "UPDATE chat_messages SET read = TRUE WHERE thread = $1 AND sender_id <> $2 AND NOT read",
    )
    .bind(thread.to_string())
    .bind(user.user_id)
    .execute(&state.pool)
    .await?;

    Ok(ApiResponse::ok(MarkedRead {
        updated: result.rows_affected(),
    }))
}

pub fn subscribe(state: &AppState, user: &AuthUser, thread: ChatThread) -> AppResult<Subscription> {
    thread.ensure_access(user)?;
    Ok(state.hub.subscribe(topics::chat(&thread.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            role,
            email: "someone@example.com".into(),
        }
    }

    #[test]
    fn thread_keys_parse_back() {
        let id = Uuid::new_v4();
        let thread: ChatThread = format!("supplier:{id}").parse().unwrap();
        assert_eq!(thread, ChatThread::Supplier(id));
        assert_eq!(thread.to_string(), format!("supplier:{id}"));
        assert!("general:abc".parse::<ChatThread>().is_err());
        assert!("support:not-a-uuid".parse::<ChatThread>().is_err());
    }

    #[test]
    fn only_the_owner_and_support_staff_join_a_thread() {
        let customer = user(Role::Customer);
        let stranger = user(Role::Customer);
        let admin = user(Role::Admin);
        let thread = ChatThread::Support(customer.user_id);

        assert!(thread.ensure_access(&customer).is_ok());
        assert!(thread.ensure_access(&admin).is_ok());
        assert!(matches!(
            thread.ensure_access(&stranger),
            Err(AppError::Forbidden)
        ));
    }

    #[test]
    fn supplier_threads_need_the_supplier_role() {
        let supplier = user(Role::Supplier);
        let thread = ChatThread::Supplier(supplier.user_id);
        assert!(thread.ensure_access(&supplier).is_ok());

        let impostor = AuthUser {
            role: Role::Customer,
            ..supplier.clone()
        };
        assert!(thread.ensure_access(&impostor).is_err());
    }
}
