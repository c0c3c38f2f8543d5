// handlers/mod.rs - Handler tiers
//
// Public (no auth) → Protected (JWT + ready tenant connection) → Elevated (admin role)
pub mod public;    // /health, /auth/*
pub mod protected; // /api/*
pub mod elevated;  // /api/admin/*
