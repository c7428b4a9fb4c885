// wabot Engine — WhatsApp command bot core
//
// Inbound text flows webhook → message loop → BotHandler → Dispatcher, which
// consults the command repository, the list resolver and the per-sender
// pending-selection store before replying through a ReplySender.

pub mod bot;
pub mod channels;
pub mod commands;
pub mod config;
pub mod dispatcher;
pub mod lists;
pub mod selections;
pub mod similarity;
pub mod whatsapp;
