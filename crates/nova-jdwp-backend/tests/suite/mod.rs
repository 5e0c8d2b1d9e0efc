mod dispatch;
mod events;
mod registry;
mod server_loop;
