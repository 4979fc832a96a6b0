use actix_web::{delete, get, post, web, HttpResponse};
use log::{debug, info, warn};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    errors::CustomError,
    models::{
        api_response::{created_response, success_response},
        swap::{AmountRequest, PercentageRequest, SelectTokenRequest, SwapOutcome, SwapSide},
        token::TokenSymbol,
    },
    services::{price_service::PriceCache, swap_form::SwapForm, swap_service::SwapController},
    state::AppState,
    utils::format::amount_for_percentage,
};

#[derive(Debug, Serialize)]
struct SessionView {
    id: Uuid,
    #[serde(flatten)]
    form: SwapForm,
    rate: Option<String>,
    input_tokens: Vec<TokenSymbol>,
    output_tokens: Vec<TokenSymbol>,
}

impl SessionView {
    fn new(id: Uuid, form: &SwapForm, prices: &PriceCache) -> Self {
        Self {
            id,
            rate: form.exchange_rate(prices),
            input_tokens: form.selectable(SwapSide::Input),
            output_tokens: form.selectable(SwapSide::Output),
            form: form.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct SubmitView {
    session: SessionView,
    #[serde(flatten)]
    outcome: SwapOutcome,
}

/// Clears a session's pending mark when a submit is dropped before it writes
/// its result back, e.g. because the client went away.
struct PendingGuard {
    state: web::Data<AppState>,
    id: Uuid,
    armed: bool,
}

impl PendingGuard {
    fn new(state: web::Data<AppState>, id: Uuid) -> Self {
        Self {
            state,
            id,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        warn!("swap session {} submit cancelled, releasing it", self.id);
        match self.state.sessions.try_lock() {
            Ok(mut sessions) => sessions.release(&self.id),
            Err(_) => {
                let state = self.state.clone();
                let id = self.id;
                actix_web::rt::spawn(async move {
                    state.sessions.lock().await.release(&id);
                });
            }
        }
    }
}

/// Runs `edit` on a stored form, then re-evaluates its button.
async fn edit_session<F>(
    state: &AppState,
    id: Uuid,
    edit: F,
) -> Result<SessionView, CustomError>
where
    F: FnOnce(&mut SwapForm, &PriceCache) -> Result<(), CustomError>,
{
    let connected = state.account().await.is_some();
    let prices = state.prices.read().await;
    let mut sessions = state.sessions.lock().await;
    let form = sessions.get_mut(&id)?;

    edit(form, &prices)?;
    form.refresh_button(connected);
    Ok(SessionView::new(id, form, &prices))
}

#[post("/sessions")]
async fn create_session(state: web::Data<AppState>) -> Result<HttpResponse, CustomError> {
    let connected = state.account().await.is_some();
    let mut form = SwapForm::new();
    form.refresh_button(connected);

    let id = Uuid::new_v4();
    let prices = state.prices.read().await;
    let view = SessionView::new(id, &form, &prices);
    let mut sessions = state.sessions.lock().await;
    sessions.insert(id, form)?;
    debug!("swap session {} created, {} open", id, sessions.len());
    Ok(created_response(view))
}

#[delete("/sessions/{id}")]
async fn delete_session(
    state: web::Data<AppState>,
    id: web::Path<Uuid>,
) -> Result<HttpResponse, CustomError> {
    let id = id.into_inner();
    state.sessions.lock().await.remove(&id)?;
    debug!("swap session {} closed", id);
    Ok(success_response(id))
}

#[get("/sessions/{id}")]
async fn get_session(
    state: web::Data<AppState>,
    id: web::Path<Uuid>,
) -> Result<HttpResponse, CustomError> {
    let view = edit_session(&state, id.into_inner(), |_, _| Ok(())).await?;
    Ok(success_response(view))
}

#[post("/sessions/{id}/tokens")]
async fn select_token(
    state: web::Data<AppState>,
    id: web::Path<Uuid>,
    req: web::Json<SelectTokenRequest>,
) -> Result<HttpResponse, CustomError> {
    let token: TokenSymbol = req.token.parse()?;
    let view = edit_session(&state, id.into_inner(), |form, prices| {
        form.select_token(req.side, token, prices)
    })
    .await?;
    Ok(success_response(view))
}

#[post("/sessions/{id}/amount")]
async fn set_amount(
    state: web::Data<AppState>,
    id: web::Path<Uuid>,
    req: web::Json<AmountRequest>,
) -> Result<HttpResponse, CustomError> {
    let view = edit_session(&state, id.into_inner(), |form, prices| {
        form.set_amount(req.side, &req.value, prices)
    })
    .await?;
    Ok(success_response(view))
}

#[post("/sessions/{id}/percentage")]
async fn set_percentage(
    state: web::Data<AppState>,
    id: web::Path<Uuid>,
    req: web::Json<PercentageRequest>,
) -> Result<HttpResponse, CustomError> {
    let id = id.into_inner();
    let src = state
        .sessions
        .lock()
        .await
        .get_mut(&id)?
        .src()
        .ok_or_else(|| CustomError::ValidationError("Select a token first".to_string()))?;

    let balance = {
        let wallet = state.wallet.lock().await;
        if wallet.account().is_none() {
            return Err(CustomError::WalletNotConnectedError);
        }
        wallet.balances().get(&src).cloned().unwrap_or_default()
    };
    let amount = amount_for_percentage(&balance, req.percent)?;

    let view = edit_session(&state, id, |form, prices| {
        form.set_amount(SwapSide::Input, &amount, prices)
    })
    .await?;
    Ok(success_response(view))
}

#[post("/sessions/{id}/reverse")]
async fn reverse(
    state: web::Data<AppState>,
    id: web::Path<Uuid>,
) -> Result<HttpResponse, CustomError> {
    let view = edit_session(&state, id.into_inner(), |form, prices| {
        form.reverse(prices)
    })
    .await?;
    Ok(success_response(view))
}

#[post("/sessions/{id}/submit")]
async fn submit(
    state: web::Data<AppState>,
    id: web::Path<Uuid>,
) -> Result<HttpResponse, CustomError> {
    let id = id.into_inner();
    let account = state.account().await;

    // mark the stored form pending so concurrent edits are refused while the
    // transaction runs without the lock
    let mut working = {
        let mut sessions = state.sessions.lock().await;
        let form = sessions.get_mut(&id)?;
        let working = form.clone();
        form.begin_transaction()?;
        working
    };
    let mut guard = PendingGuard::new(state.clone(), id);

    let outcome = SwapController::new(state.gateway.as_ref())
        .click(&mut working, account)
        .await;
    if outcome.receipt.is_some() {
        info!("session {} transaction confirmed", id);
        state
            .wallet
            .lock()
            .await
            .refresh_balances(state.gateway.as_ref())
            .await;
    }

    let prices = state.prices.read().await;
    let session = SessionView::new(id, &working, &prices);
    {
        let mut sessions = state.sessions.lock().await;
        *sessions.get_mut(&id)? = working;
        guard.disarm();
    }
    Ok(success_response(SubmitView { session, outcome }))
}
