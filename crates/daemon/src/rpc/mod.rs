// JSON-RPC server: method dispatch over the Unix socket.

pub mod methods;
pub mod unix;
