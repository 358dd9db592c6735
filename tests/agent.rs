#[path = "support/scripted_backend.rs"]
mod scripted_backend;

#[path = "agent/backend_switch.rs"]
mod backend_switch;
#[path = "agent/session_state.rs"]
mod session_state;
#[path = "agent/tool_loop_flow.rs"]
mod tool_loop_flow;
