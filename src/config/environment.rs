//! Configuración de variables de entorno
//!
//! Este módulo maneja la configuración del entorno y los parámetros
//! operativos del núcleo de sesión (URLs de los servicios, señalización
//! y políticas de reserva/reconexión/facturación).

use std::env;
use std::time::Duration;

/// Configuración del entorno
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub environment: String,
    /// URL base del API REST (catálogo, saldo, reservas)
    pub api_base_url: String,
    /// URL base del servidor de señalización WebSocket
    pub signaling_url: String,
    /// Servidores ICE para la conexión peer
    pub ice_servers: Vec<String>,
    /// Duración de la reserva en minutos
    pub reservation_hold_minutes: i64,
    /// Intervalo de heartbeat por el canal de control, en segundos
    pub heartbeat_secs: u64,
    /// Máximo de intentos de reconexión antes de declarar fallo permanente
    pub reconnect_max_attempts: u32,
    /// Minutos mínimos de saldo exigidos antes de reservar o arrancar
    pub min_ride_minutes: i64,
    /// Timeout de las llamadas HTTP en segundos
    pub request_timeout_secs: u64,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            api_base_url: env::var("API_BASE_URL").expect("API_BASE_URL must be set"),
            signaling_url: env::var("SIGNALING_URL").expect("SIGNALING_URL must be set"),
            ice_servers: env::var("ICE_SERVERS")
                .unwrap_or_else(|_| "stun:stun.l.google.com:19302".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            reservation_hold_minutes: env::var("RESERVATION_HOLD_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            heartbeat_secs: env::var("HEARTBEAT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            reconnect_max_attempts: env::var("RECONNECT_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            min_ride_minutes: env::var("MIN_RIDE_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            request_timeout_secs: env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
        }
    }
}

impl EnvironmentConfig {
    /// Cargar variables de entorno desde `.env` y construir la
    /// configuración; el arranque típico de la aplicación anfitriona
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::default()
    }

    /// Verificar si estamos en modo desarrollo
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Verificar si estamos en modo producción
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Intervalo de heartbeat como `Duration`
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    /// Timeout HTTP como `Duration`
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Configuración con valores fijos, útil para pruebas y demos
    pub fn for_testing() -> Self {
        Self {
            environment: "test".to_string(),
            api_base_url: "http://localhost:3000".to_string(),
            signaling_url: "ws://localhost:8080".to_string(),
            ice_servers: vec!["stun:stun.l.google.com:19302".to_string()],
            reservation_hold_minutes: 10,
            heartbeat_secs: 30,
            reconnect_max_attempts: 5,
            min_ride_minutes: 5,
            request_timeout_secs: 10,
        }
    }
}
