pub mod openweather;

pub use openweather::{OpenWeatherClient, ProviderError, WeatherProvider};
