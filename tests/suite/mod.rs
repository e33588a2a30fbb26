mod extraction;
mod session;
