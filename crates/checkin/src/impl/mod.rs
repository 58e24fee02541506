mod event;
mod gateway;
mod pool;
mod session;
mod ticket;
