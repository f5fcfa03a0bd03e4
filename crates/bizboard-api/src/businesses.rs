use bizboard_db::Session;
use bizboard_db::businesses;
use bizboard_db::models::{BusinessChanges, NewBusiness, NewMember, NewTransaction};
use bizboard_types::api::{
    Ack, AdvertisementResponse, ArchiveBusinessRequest, BusinessCreated, BusinessJoined,
    BusinessesResponse, ChatResponse, ChatSent, CreateBusinessRequest, CreateTransactionRequest,
    JoinBusinessRequest, NoteRequest, NoteSaved, SendChatRequest, TransactionCreated,
    TransactionsResponse, UpdateBusinessRequest,
};
use bizboard_types::models::{BusinessDetail, BusinessStats, MemberRole};
use chrono::{DateTime, Utc};
use rand::Rng;
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::context::AuthContext;
use crate::dispatch::{Service, respond};
use crate::error::{ApiError, DomainError};
use crate::event::{Event, trailing_id};

pub const ONLINE_CODE_LEN: usize = 20;
const ONLINE_CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

const BUSINESS_LIST_LIMIT: u32 = 20;
const TRANSACTION_LIST_LIMIT: u32 = 500;
const CHAT_HISTORY_LIMIT: u32 = 500;

/// Businesses, their ledger, notes, chat and the advertisement slot.
pub struct BusinessService;

impl Service for BusinessService {
    fn name(&self) -> &'static str {
        "businesses"
    }

    fn allow_methods(&self) -> &'static str {
        "GET, POST, PUT, OPTIONS"
    }

    fn allow_headers(&self) -> &'static str {
        "Content-Type, X-User-Id"
    }

    fn route(&self, session: &mut Session, event: &Event) -> Result<Value, ApiError> {
        let ctx = AuthContext::from_headers(&event.headers)?;
        let path = event.path();

        match event.method.as_str() {
            "GET" => match path {
                "businesses" => session.unit(|conn| list_businesses(conn, &ctx).and_then(respond)),
                _ if path.starts_with("business/") => {
                    let business_id = trailing_id(path)?;
                    session.unit(|conn| business_detail(conn, business_id).and_then(respond))
                }
                "transactions" => {
                    let business_id = event.query_id("business_id")?;
                    session.unit(|conn| list_transactions(conn, business_id).and_then(respond))
                }
                "chat" => {
                    let business_id = event.query_id("business_id")?;
                    session.unit(|conn| chat_history(conn, business_id).and_then(respond))
                }
                "advertisement" => session.unit(|conn| advertisement(conn).and_then(respond)),
                "stats" => {
                    let business_id = event.query_id("business_id")?;
                    session.unit(|conn| {
                        business_stats(conn, business_id, Utc::now()).and_then(respond)
                    })
                }
                _ => Err(DomainError::InvalidPath.into()),
            },
            "POST" => {
                let body: Value = event.json_body()?;
                session.unit(|conn| match path {
                    "business" => create_business(conn, &ctx, &body).and_then(respond),
                    "transaction" => create_transaction(conn, &ctx, &body).and_then(respond),
                    "note" => save_note(conn, &ctx, &body).and_then(respond),
                    "join-business" => join_business(conn, &ctx, &body).and_then(respond),
                    "chat" => send_chat_message(conn, &ctx, &body).and_then(respond),
                    _ => Err(DomainError::InvalidPath.into()),
                })
            }
            "PUT" => {
                let body: Value = event.json_body()?;
                session.unit(|conn| match path {
                    "business" => update_business(conn, &ctx, &body).and_then(respond),
                    "archive-business" => archive_business(conn, &ctx, &body).and_then(respond),
                    _ => Err(DomainError::InvalidPath.into()),
                })
            }
            _ => Err(DomainError::MethodNotAllowed.into()),
        }
    }
}

/// A random code over `A-Z0-9`.
pub fn generate_online_code() -> String {
    let mut rng = rand::rng();
    (0..ONLINE_CODE_LEN)
        .map(|_| ONLINE_CODE_CHARSET[rng.random_range(0..ONLINE_CODE_CHARSET.len())] as char)
        .collect()
}

/// Draw codes until one is unused. Check-then-insert: two concurrent creates
/// can still race to the same code, and the unique index rejects the loser.
fn unused_online_code(conn: &Connection) -> Result<String, ApiError> {
    loop {
        let code = generate_online_code();
        if !businesses::online_code_exists(conn, &code)? {
            return Ok(code);
        }
        debug!("Online code collision, drawing again");
    }
}

pub fn create_business(
    conn: &Connection,
    ctx: &AuthContext,
    body: &Value,
) -> Result<BusinessCreated, ApiError> {
    let owner_id = ctx.require_user()?;
    let req = CreateBusinessRequest::deserialize(body)?;

    let online_code = if req.is_online {
        Some(unused_online_code(conn)?)
    } else {
        None
    };

    let created = businesses::insert(
        conn,
        &NewBusiness {
            owner_id,
            name: &req.name,
            description: &req.description,
            icon: &req.icon,
            color: &req.color,
            is_online: req.is_online,
            online_code: online_code.as_deref(),
        },
    )?;

    if req.is_online {
        businesses::add_member(
            conn,
            &NewMember {
                business_id: created.id,
                user_id: owner_id,
                role: MemberRole::Owner,
            },
        )?;
    }

    info!("User {} created business {}", owner_id, created.id);
    Ok(BusinessCreated {
        success: true,
        business_id: created.id,
        online_code: created.online_code,
    })
}

pub fn list_businesses(
    conn: &Connection,
    ctx: &AuthContext,
) -> Result<BusinessesResponse, ApiError> {
    let user_id = ctx.require_user()?;
    let businesses = businesses::list_for_user(conn, user_id, BUSINESS_LIST_LIMIT)?;
    Ok(BusinessesResponse { businesses })
}

pub fn business_detail(conn: &Connection, business_id: i64) -> Result<BusinessDetail, ApiError> {
    let aggregate =
        businesses::find_aggregate(conn, business_id)?.ok_or(DomainError::BusinessNotFound)?;
    let members = businesses::members(conn, business_id)?;
    let note = businesses::latest_note(conn, business_id)?;

    Ok(BusinessDetail {
        business: aggregate.business,
        member_count: aggregate.member_count,
        balance: aggregate.balance,
        members,
        note,
    })
}

pub fn update_business(
    conn: &Connection,
    ctx: &AuthContext,
    body: &Value,
) -> Result<Ack, ApiError> {
    let owner_id = ctx.require_user()?;
    let req = UpdateBusinessRequest::deserialize(body)?;

    let changes = BusinessChanges {
        name: req.name.as_deref(),
        description: req.description.as_deref(),
        icon: req.icon.as_deref(),
        color: req.color.as_deref(),
    };
    if !businesses::update(conn, owner_id, req.business_id, &changes)? {
        return Err(DomainError::NotFoundOrAccessDenied.into());
    }
    Ok(Ack::ok())
}

pub fn archive_business(
    conn: &Connection,
    ctx: &AuthContext,
    body: &Value,
) -> Result<Ack, ApiError> {
    let owner_id = ctx.require_user()?;
    let req = ArchiveBusinessRequest::deserialize(body)?;

    if !businesses::archive(conn, owner_id, req.business_id)? {
        return Err(DomainError::NotFoundOrAccessDenied.into());
    }
    info!("User {} archived business {:?}", owner_id, req.business_id);
    Ok(Ack::ok())
}

pub fn join_business(
    conn: &Connection,
    ctx: &AuthContext,
    body: &Value,
) -> Result<BusinessJoined, ApiError> {
    let user_id = ctx.require_user()?;
    let req = JoinBusinessRequest::deserialize(body)?;

    let target = businesses::find_online_by_code(conn, req.online_code.as_deref())?
        .ok_or(DomainError::JoinCodeNotFound)?;

    let member = NewMember {
        business_id: target.id,
        user_id,
        role: MemberRole::Member,
    };
    // The unique (business, user) pair turns a second join into "no row".
    if businesses::add_member(conn, &member)?.is_none() {
        return Err(DomainError::AlreadyMember.into());
    }

    info!("User {} joined business {}", user_id, target.id);
    Ok(BusinessJoined {
        success: true,
        business_id: target.id,
        business_name: target.name,
    })
}

// -- Ledger --

pub fn create_transaction(
    conn: &Connection,
    ctx: &AuthContext,
    body: &Value,
) -> Result<TransactionCreated, ApiError> {
    let user_id = ctx.require_user()?;
    let req = CreateTransactionRequest::deserialize(body)?;

    let inserted = businesses::insert_transaction(
        conn,
        &NewTransaction {
            business_id: req.business_id,
            kind: req.kind,
            amount: req.amount,
            category: &req.category,
            description: &req.description,
            created_by: user_id,
            date: req.date,
        },
    )?;

    Ok(TransactionCreated {
        success: true,
        transaction_id: inserted.id,
    })
}

pub fn list_transactions(
    conn: &Connection,
    business_id: Option<i64>,
) -> Result<TransactionsResponse, ApiError> {
    let transactions = businesses::list_transactions(conn, business_id, TRANSACTION_LIST_LIMIT)?;
    Ok(TransactionsResponse { transactions })
}

pub fn business_stats(
    conn: &Connection,
    business_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<BusinessStats, ApiError> {
    let business_id = business_id.ok_or(DomainError::BusinessNotFound)?;
    let created_at =
        businesses::created_at(conn, business_id)?.ok_or(DomainError::BusinessNotFound)?;
    let totals = businesses::ledger_totals(conn, business_id)?;

    Ok(BusinessStats::compute(
        totals.income,
        totals.expenses,
        totals.count,
        created_at,
        now,
    ))
}

// -- Notes --

/// One note per business: rewrite it when present, otherwise create it.
pub fn save_note(
    conn: &Connection,
    ctx: &AuthContext,
    body: &Value,
) -> Result<NoteSaved, ApiError> {
    let user_id = ctx.require_user()?;
    let req = NoteRequest::deserialize(body)?;

    let note_id = match businesses::note_id(conn, req.business_id)? {
        Some(_) => businesses::update_note(conn, req.business_id, &req.content, &req.rich_text)?,
        None => businesses::insert_note(
            conn,
            req.business_id,
            &req.content,
            &req.rich_text,
            user_id,
        )?,
    };

    Ok(NoteSaved {
        success: true,
        note_id,
    })
}

// -- Chat --

pub fn send_chat_message(
    conn: &Connection,
    ctx: &AuthContext,
    body: &Value,
) -> Result<ChatSent, ApiError> {
    let user_id = ctx.require_user()?;
    let req = SendChatRequest::deserialize(body)?;

    let inserted = businesses::insert_chat_message(conn, req.business_id, user_id, &req.message)?;
    Ok(ChatSent {
        success: true,
        message_id: inserted.id,
        created_at: inserted.created_at,
    })
}

pub fn chat_history(conn: &Connection, business_id: Option<i64>) -> Result<ChatResponse, ApiError> {
    let messages = businesses::chat_messages(conn, business_id, CHAT_HISTORY_LIMIT)?;
    Ok(ChatResponse { messages })
}

pub fn advertisement(conn: &Connection) -> Result<AdvertisementResponse, ApiError> {
    let advertisement = businesses::active_advertisement(conn)?;
    Ok(AdvertisementResponse { advertisement })
}
