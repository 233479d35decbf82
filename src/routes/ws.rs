//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. We reply with a single JSON message per request.
//!
//! The connection itself is the feedback session: one counter per process
//! hands out connection ids, and the busy guard keys on that id.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{debug, error, info, instrument};

use crate::favorites;
use crate::logic::{self, NewProblem};
use crate::notes;
use crate::protocol::{to_out, ClientWsMessage, SaveNoteIn, ServerWsMessage};
use crate::routes::http::{
  catalogs_out, hint_flow, load_problem_flow, note_problems, save_note_flow, toggle_favorite_flow,
};
use crate::state::AppState;

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "dojo_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  let session_id = format!("ws-{}", NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed));
  info!(target: "dojo_backend", %session_id, "WebSocket connected");

  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        // Parse, dispatch, serialize response.
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "dojo_backend", "WS received: {:?}", &incoming);
            handle_client_ws(incoming, &state, &session_id).await
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "dojo_backend", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }

  // A connection that drops mid-feedback must not wedge its guard slot.
  state.end_feedback(&session_id).await;
  info!(target: "dojo_backend", %session_id, "WebSocket disconnected");
}

#[instrument(level = "info", skip(state, msg))]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState, session_id: &str) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::NewProblem { catalog_file, filters } => {
      match logic::new_problem(state, &catalog_file, &filters).await {
        Ok(NewProblem::Picked { problem, rendered }) => {
          info!(target: "selection", id = %problem.id, "WS problem served");
          ServerWsMessage::Problem { problem: to_out(&problem), rendered }
        }
        Ok(NewProblem::NoMatch(no_match)) => ServerWsMessage::NoMatch { message: no_match.to_string() },
        Err(e) => ServerWsMessage::Error { message: e.to_string() },
      }
    }

    ClientWsMessage::LoadProblem { problem_id, catalog_file } => {
      match load_problem_flow(state, &catalog_file, &problem_id).await {
        Ok((problem, rendered)) => {
          info!(target: "selection", id = %problem.id, "WS problem loaded by id");
          ServerWsMessage::Problem { problem: to_out(&problem), rendered }
        }
        Err(message) => ServerWsMessage::Error { message },
      }
    }

    ClientWsMessage::Hint { problem_id, catalog_file } => {
      match hint_flow(state, &catalog_file, &problem_id).await {
        Ok(text) => ServerWsMessage::Hint { problem_id, text },
        Err(message) => ServerWsMessage::Error { message },
      }
    }

    ClientWsMessage::SubmitCode { problem_id, code } => {
      let text = logic::request_feedback(state, session_id, &problem_id, &code).await;
      info!(target: "dojo_backend", id = %problem_id, "WS feedback served");
      ServerWsMessage::Feedback { problem_id, text }
    }

    ClientWsMessage::SaveNote { problem_id, catalog_file, code, feedback, nickname } => {
      let body = SaveNoteIn { problem_id, catalog_file, code, feedback, nickname };
      match save_note_flow(state, &body).await {
        Ok(message) => ServerWsMessage::NoteSaved { message },
        Err(message) => ServerWsMessage::Error { message },
      }
    }

    ClientWsMessage::ListNoteProblems => {
      ServerWsMessage::NoteProblems { problems: note_problems(state) }
    }

    ClientWsMessage::ListNoteAttempts { catalog_file, problem_id } => {
      let entries = notes::failed_attempts(&notes::load_all(&state.paths.notes_path));
      let attempts = notes::attempts_for_problem(&entries, &catalog_file, &problem_id)
        .into_iter()
        .cloned()
        .collect();
      ServerWsMessage::NoteAttempts { attempts }
    }

    ClientWsMessage::Rechallenge { catalog_file, problem_id, nickname, timestamp } => {
      match logic::load_rechallenge(state, &catalog_file, &problem_id, &nickname, &timestamp).await {
        Ok(Some((problem, attempt, rendered))) => {
          ServerWsMessage::Rechallenge { problem: to_out(&problem), attempt, rendered }
        }
        Ok(None) => ServerWsMessage::Error { message: "No matching wrong-note attempt was found.".into() },
        Err(e) => ServerWsMessage::Error { message: e.to_string() },
      }
    }

    ClientWsMessage::ListCatalogs => {
      let out = catalogs_out(state).await;
      ServerWsMessage::Catalogs {
        files: out.files,
        current: out.current,
        difficulties: out.difficulties,
        kinds: out.kinds,
      }
    }

    ClientWsMessage::ListFavorites => {
      ServerWsMessage::Favorites { favorites: favorites::load(&state.paths.favorites_path) }
    }

    ClientWsMessage::ToggleFavorite { problem_id, catalog_file } => {
      match toggle_favorite_flow(state, &catalog_file, &problem_id).await {
        Ok(favorite) => ServerWsMessage::FavoriteToggled { problem_id, favorite },
        Err(message) => ServerWsMessage::Error { message },
      }
    }
  }
}
