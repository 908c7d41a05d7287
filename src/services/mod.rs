// Services: the public entry points built on the template domain

pub mod loader;
