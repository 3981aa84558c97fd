pub mod cli;
pub mod config;
pub mod error;
pub mod ids;
pub mod routes;
pub mod state;
pub mod storage;

pub mod models {
    pub mod chat;
    pub mod message;
    pub mod theme;
    pub mod user;
}

pub mod repositories {
    pub mod chat_history;
    pub mod theme;
    pub mod user;
}

pub mod services {
    pub mod completion;
    pub mod conversation;
    pub mod openai;
    pub mod profile;
}

pub mod handlers {
    pub mod chat;
    pub mod debug;
}

pub mod validation {
    pub mod chat;
}
